/// Process Runner - Toolchain Subprocess Execution
///
/// **Core Responsibility:**
/// Spawn one toolchain command inside a per-request workspace, bound it by a
/// wall-clock timeout and hand back the raw outcome.
///
/// **Guarantees:**
/// - Unique workspace per request, removed on every exit path (Drop guard)
/// - Hard timeout: the whole process group is killed, not just the child
/// - Output on timeout is discarded
/// - A command that cannot be found is reported as `ToolchainMissing`
/// - Captured output is capped per stream; the remainder is drained
///
/// The runner never judges the outcome; that is the evaluator's job.
use crate::config::{ExecutorConfig, SandboxPolicy};
use crate::error::{ExecutionError, Result};
use crate::sandbox;
use quest_common::ExitStatus;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

const WORKSPACE_PREFIX: &str = "quest-";

/// How long to wait for a killed child and its output pipes
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Per-request artifact directory - guarantees removal on drop
///
/// Removal happens even if the executor panics or the request future is
/// dropped mid-run.
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create a uniquely named directory under `temp_root` (or the system
    /// temp dir)
    pub fn create(temp_root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match temp_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(ExecutionError::Workspace)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(ExecutionError::Workspace)?;

        debug!(path = %dir.path().display(), "Created workspace");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        // `dir` is only taken in Drop
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Write `contents` to `relative`, creating parent directories
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ExecutionError::Workspace)?;
        }
        fs::write(&path, contents).map_err(ExecutionError::Workspace)?;
        Ok(path)
    }

    pub fn create_dir(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.path().join(relative);
        fs::create_dir_all(&path).map_err(ExecutionError::Workspace)?;
        Ok(path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove workspace");
            }
        }
    }
}

/// Which step of an executor a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Availability check (e.g. is pytest importable)
    Probe,
    /// Compiler or build-tool step; failure here is a compile error
    Compile,
    Run,
}

/// One toolchain invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub phase: Phase,
    /// Working directory relative to the workspace root
    pub subdir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_millis(timeout_ms),
            phase: Phase::Run,
            subdir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn in_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Raw result of one toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    pub phase: Phase,
    pub program: String,
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == ExitStatus::Success
    }

    fn failed_to_start(spec: &CommandSpec, status: ExitStatus, message: String) -> Self {
        Self {
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: message,
            elapsed_ms: 0,
            phase: spec.phase,
            program: spec.program.clone(),
        }
    }
}

/// Spawns toolchain commands under the configured sandbox policy
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    sandbox: SandboxPolicy,
    temp_root: Option<PathBuf>,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            sandbox: config.sandbox.clone(),
            temp_root: config.temp_root.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Create the artifact directory for one request
    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::create(self.temp_root.as_deref())
    }

    /// Run `spec` inside `workspace` and wait for it, bounded by its timeout.
    /// With a sandbox identity configured, the workspace is chowned to it
    /// before every spawn so files written by earlier steps stay reachable.
    #[instrument(skip(self, workspace, spec), fields(program = %spec.program, phase = ?spec.phase, timeout_ms = spec.timeout.as_millis() as u64))]
    pub async fn run(&self, workspace: &Workspace, spec: &CommandSpec) -> ProcessOutcome {
        if let Some(run_as) = self.sandbox.run_as {
            if let Err(e) = sandbox::grant_ownership(workspace.path(), run_as) {
                return ProcessOutcome::failed_to_start(
                    spec,
                    ExitStatus::InternalError,
                    format!("Failed to hand workspace to sandbox user: {}", e),
                );
            }
        }

        let cwd = match &spec.subdir {
            Some(subdir) => workspace.path().join(subdir),
            None => workspace.path().to_path_buf(),
        };

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        sandbox::confine(&mut command, &self.sandbox);
        command.envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let start_time = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(program = %spec.program, "Toolchain not found");
                return ProcessOutcome::failed_to_start(
                    spec,
                    ExitStatus::ToolchainMissing,
                    format!("{} not found. Is it installed and on PATH?", spec.program),
                );
            }
            Err(e) => {
                warn!(program = %spec.program, error = %e, "Failed to spawn toolchain");
                return ProcessOutcome::failed_to_start(
                    spec,
                    ExitStatus::InternalError,
                    format!("Failed to start {}: {}", spec.program, e),
                );
            }
        };

        let pid = child.id();
        let stdout_reader = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, self.max_output_bytes)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, self.max_output_bytes)));

        // HARD TIMEOUT: only the wait is bounded; the readers finish once
        // every holder of the pipes is gone
        let waited = tokio::time::timeout(spec.timeout, wait_and_sweep(&mut child, pid)).await;

        let (status, exit_code, note) = match waited {
            Ok(Ok(exit)) => {
                let (status, code, note) = describe_exit(exit);
                debug!(exit_code = ?code, "Process exited");
                (status, code, note)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to wait for toolchain process");
                (ExitStatus::InternalError, None, Some(format!("Failed to wait for {}: {}", spec.program, e)))
            }
            Err(_) => {
                warn!(
                    timeout_ms = spec.timeout.as_millis() as u64,
                    "Execution timed out - killing process group"
                );
                if let Some(pid) = pid {
                    sweep_group(pid);
                }
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Child already gone");
                }
                if tokio::time::timeout(REAP_GRACE, child.wait()).await.is_err() {
                    warn!(pid = ?pid, "Timed-out process did not exit after SIGKILL");
                }
                (ExitStatus::Timeout, None, None)
            }
        };

        let stdout = collect(stdout_reader).await;
        let stderr = collect(stderr_reader).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        let outcome = match status {
            // Partial output is never presented
            ExitStatus::Timeout => ProcessOutcome {
                status,
                exit_code,
                stdout: String::new(),
                stderr: format!("Code execution timed out after {}", describe_budget(spec.timeout)),
                elapsed_ms,
                phase: spec.phase,
                program: spec.program.clone(),
            },
            _ => {
                let mut stderr = stderr;
                if let Some(note) = note {
                    if !stderr.is_empty() && !stderr.ends_with('\n') {
                        stderr.push('\n');
                    }
                    stderr.push_str(&note);
                }
                ProcessOutcome {
                    status,
                    exit_code,
                    stdout,
                    stderr,
                    elapsed_ms,
                    phase: spec.phase,
                    program: spec.program.clone(),
                }
            }
        };

        debug!(
            status = ?outcome.status,
            elapsed_ms = outcome.elapsed_ms,
            stdout_bytes = outcome.stdout.len(),
            stderr_bytes = outcome.stderr.len(),
            "Command finished"
        );
        outcome
    }
}

/// Map a process exit to (status, code, extra stderr note)
fn describe_exit(exit: std::process::ExitStatus) -> (ExitStatus, Option<i32>, Option<String>) {
    if exit.success() {
        return (ExitStatus::Success, Some(0), None);
    }

    if let Some(code) = exit.code() {
        return (ExitStatus::NonZeroExit, Some(code), None);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = exit.signal() {
            // Shell convention so callers see a familiar number
            let code = 128 + signal;
            let note = match signal {
                libc::SIGKILL => "[Process killed: likely exceeded memory or process limit]".to_string(),
                libc::SIGSEGV => "[Process killed: segmentation fault]".to_string(),
                libc::SIGXCPU => "[Process killed: CPU time limit exceeded]".to_string(),
                libc::SIGXFSZ => "[Process killed: file size limit exceeded]".to_string(),
                libc::SIGABRT => "[Process aborted]".to_string(),
                other => format!("[Process terminated by signal {}]", other),
            };
            return (ExitStatus::NonZeroExit, Some(code), Some(note));
        }
    }

    (ExitStatus::NonZeroExit, None, None)
}

fn describe_budget(timeout: Duration) -> String {
    let ms = timeout.as_millis();
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}ms", ms)
    }
}

/// Wait for the leader, then kill any group members it left behind (for
/// example background jobs still holding the pipes open). The leader stays
/// unreaped until the sweep so its group id cannot be recycled.
async fn wait_and_sweep(child: &mut Child, pid: Option<u32>) -> io::Result<std::process::ExitStatus> {
    let Some(pid) = pid else {
        return child.wait().await;
    };

    match tokio::task::spawn_blocking(move || sandbox::wait_exited(pid)).await {
        Ok(Ok(())) => {
            sweep_group(pid);
            child.wait().await
        }
        outcome => {
            debug!(pid, ?outcome, "Non-reaping wait unavailable, sweeping after reap");
            let exit = child.wait().await;
            // The group id stays reserved while any member is alive
            sweep_group(pid);
            exit
        }
    }
}

fn sweep_group(pid: u32) {
    if sandbox::kill_process_group(pid) {
        debug!(pid, "Killed remaining process group members");
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes
async fn read_capped<R>(mut pipe: R, limit: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];

    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
                if n > room {
                    truncated = true;
                }
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading output pipe");
                break;
            }
        }
    }

    (kept, truncated)
}

async fn collect(reader: Option<tokio::task::JoinHandle<(Vec<u8>, bool)>>) -> String {
    let Some(mut handle) = reader else {
        return String::new();
    };

    let (bytes, truncated) = match tokio::time::timeout(REAP_GRACE, &mut handle).await {
        Ok(Ok(read)) => read,
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader task failed");
            return String::new();
        }
        Err(_) => {
            // A descendant escaped the process group and still holds the pipe
            warn!("Output pipe still open after process exit; abandoning reader");
            handle.abort();
            return String::new();
        }
    };

    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("[Output truncated]");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_in(root: &Path) -> ProcessRunner {
        let config = ExecutorConfig {
            temp_root: Some(root.to_path_buf()),
            ..Default::default()
        };
        ProcessRunner::new(&config)
    }

    fn shell(script: &str, timeout_ms: u64) -> CommandSpec {
        CommandSpec::new("sh", timeout_ms).args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();

        let outcome = runner
            .run(&workspace, &shell("echo out; echo err >&2", 5000))
            .await;

        assert_eq!(outcome.status, ExitStatus::Success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();

        let outcome = runner
            .run(&workspace, &shell("echo broken >&2; exit 3", 5000))
            .await;

        assert_eq!(outcome.status, ExitStatus::NonZeroExit);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.stderr.contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_program_is_toolchain_missing() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();

        let outcome = runner
            .run(&workspace, &CommandSpec::new("quest-no-such-toolchain", 5000))
            .await;

        assert_eq!(outcome.status, ExitStatus::ToolchainMissing);
        assert!(outcome.stderr.contains("quest-no-such-toolchain"));
    }

    #[tokio::test]
    async fn test_timeout_discards_output() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();

        let started = Instant::now();
        let outcome = runner
            .run(&workspace, &shell("echo partial; while :; do :; done", 500))
            .await;

        assert_eq!(outcome.status, ExitStatus::Timeout);
        assert!(outcome.stdout.is_empty());
        assert!(outcome.stderr.contains("timed out after 500ms"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();
        let pid_file = workspace.path().join("grandchild.pid");

        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let outcome = runner.run(&workspace, &shell(&script, 500)).await;
        assert_eq!(outcome.status, ExitStatus::Timeout);

        let pid = fs::read_to_string(&pid_file).unwrap();
        let stat = PathBuf::from(format!("/proc/{}/stat", pid.trim()));
        // Gone, or a zombie awaiting its reaper
        let alive = fs::read_to_string(&stat)
            .map(|s| !s.contains(") Z "))
            .unwrap_or(false);
        assert!(!alive, "grandchild {} survived the timeout", pid.trim());
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_run_open() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();

        let started = Instant::now();
        let outcome = runner
            .run(&workspace, &shell("sleep 30 & echo done", 10_000))
            .await;

        assert_eq!(outcome.status, ExitStatus::Success);
        assert_eq!(outcome.stdout, "done\n");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_successful_run_sweeps_background_children() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();
        let pid_file = workspace.path().join("background.pid");

        let script = format!("sleep 30 & echo $! > {}", pid_file.display());
        let outcome = runner.run(&workspace, &shell(&script, 10_000)).await;
        assert_eq!(outcome.status, ExitStatus::Success);

        let pid = fs::read_to_string(&pid_file).unwrap();
        let stat = PathBuf::from(format!("/proc/{}/stat", pid.trim()));
        let alive = fs::read_to_string(&stat)
            .map(|s| !s.contains(") Z "))
            .unwrap_or(false);
        assert!(!alive, "background job {} outlived its run", pid.trim());
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let root = tempfile::tempdir().unwrap();
        let config = ExecutorConfig {
            temp_root: Some(root.path().to_path_buf()),
            max_output_bytes: 16,
            ..Default::default()
        };
        let runner = ProcessRunner::new(&config);
        let workspace = runner.create_workspace().unwrap();

        let outcome = runner
            .run(&workspace, &shell("i=0; while [ $i -lt 100 ]; do echo line$i; i=$((i+1)); done", 5000))
            .await;

        assert_eq!(outcome.status, ExitStatus::Success);
        assert!(outcome.stdout.starts_with("line0\nline1\n"));
        assert!(outcome.stdout.ends_with("[Output truncated]"));
    }

    #[tokio::test]
    async fn test_runs_in_workspace_subdir() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner_in(root.path());
        let workspace = runner.create_workspace().unwrap();
        workspace.write_file("project/marker.txt", "here").unwrap();

        let outcome = runner
            .run(&workspace, &shell("cat marker.txt", 5000).in_subdir("project"))
            .await;

        assert_eq!(outcome.stdout, "here");
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(Some(root.path())).unwrap();
        workspace.write_file("src/test/java/A.java", "class A {}").unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.exists());

        drop(workspace);

        assert!(!path.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_workspaces_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let first = Workspace::create(Some(root.path())).unwrap();
        let second = Workspace::create(Some(root.path())).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(WORKSPACE_PREFIX)));
    }

    #[test]
    fn test_describe_budget() {
        assert_eq!(describe_budget(Duration::from_secs(10)), "10s");
        assert_eq!(describe_budget(Duration::from_millis(1500)), "1500ms");
    }
}
