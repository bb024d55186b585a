//! Restrictions applied to every toolchain process: its own process group
//! (so a timeout can take down descendants), optional rlimits, an optional
//! low-privilege identity and an optional scrubbed environment.

use crate::config::{RunAs, SandboxPolicy};
use std::io;
use std::path::Path;
use tokio::process::Command;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type Resource = libc::c_int;

/// Plain-data copy of the limits, moved into the pre-exec hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Limits {
    address_space_bytes: Option<u64>,
    cpu_secs: Option<u64>,
    processes: Option<u64>,
    file_size_bytes: Option<u64>,
    no_core_dumps: bool,
}

impl Limits {
    fn is_empty(&self) -> bool {
        *self == Limits::default()
    }
}

impl From<&SandboxPolicy> for Limits {
    fn from(policy: &SandboxPolicy) -> Self {
        const MB: u64 = 1024 * 1024;
        Self {
            address_space_bytes: policy.memory_limit_mb.map(|mb| mb.saturating_mul(MB)),
            cpu_secs: policy.cpu_time_limit_secs,
            processes: policy.max_processes,
            file_size_bytes: policy.max_file_size_mb.map(|mb| mb.saturating_mul(MB)),
            no_core_dumps: policy.disable_core_dumps,
        }
    }
}

/// Configure `command` according to `policy`
pub fn confine(command: &mut Command, policy: &SandboxPolicy) {
    if policy.clear_env {
        command.env_clear();
        for key in &policy.env_allowlist {
            if let Some(value) = std::env::var_os(key) {
                command.env(key, value);
            }
        }
    }

    #[cfg(unix)]
    {
        command.process_group(0);

        if let Some(RunAs { uid, gid }) = policy.run_as {
            command.gid(gid);
            command.uid(uid);
        }

        let limits = Limits::from(policy);
        if !limits.is_empty() {
            // SAFETY: the hook only calls setrlimit, which is async-signal-safe,
            // and touches no memory shared with the parent.
            unsafe {
                command.pre_exec(move || apply_limits(&limits));
            }
        }
    }
}

#[cfg(unix)]
fn apply_limits(limits: &Limits) -> io::Result<()> {
    if let Some(bytes) = limits.address_space_bytes {
        set_limit(libc::RLIMIT_AS, bytes, bytes)?;
    }
    if let Some(secs) = limits.cpu_secs {
        // SIGXCPU at the soft limit, SIGKILL one second later
        set_limit(libc::RLIMIT_CPU, secs, secs.saturating_add(1))?;
    }
    if let Some(count) = limits.processes {
        set_limit(libc::RLIMIT_NPROC, count, count)?;
    }
    if let Some(bytes) = limits.file_size_bytes {
        set_limit(libc::RLIMIT_FSIZE, bytes, bytes)?;
    }
    if limits.no_core_dumps {
        set_limit(libc::RLIMIT_CORE, 0, 0)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_limit(resource: Resource, soft: u64, hard: u64) -> io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };
    // SAFETY: plain syscall on a stack value
    if unsafe { libc::setrlimit(resource, &limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// SIGKILL every process in the group led by `pid`. Returns false when the
/// group no longer exists.
pub fn kill_process_group(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: negative pid addresses the process group
        unsafe { libc::kill(-pgid, libc::SIGKILL) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Block until `pid` exits without reaping it. The zombie keeps its pid and
/// process group id reserved, so a following `kill_process_group` cannot hit
/// an unrelated group that recycled the id.
pub fn wait_exited(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        let id = libc::id_t::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        loop {
            // SAFETY: siginfo_t is plain data and only written by the kernel
            let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
            let rc = unsafe { libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::ErrorKind::Unsupported.into())
    }
}

/// Hand the workspace tree over to the sandbox identity
pub fn grant_ownership(root: &Path, run_as: RunAs) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::chown(root, Some(run_as.uid), Some(run_as.gid))?;
        if root.is_dir() {
            for entry in std::fs::read_dir(root)? {
                let entry = entry?;
                if entry.file_type()?.is_symlink() {
                    continue;
                }
                grant_ownership(&entry.path(), run_as)?;
            }
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = (root, run_as);
        Ok(())
    }
}
