// Execution configuration for the Quest executor
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/executor.json";

/// Safety limit to keep pathological submissions away from the toolchains
const DEFAULT_MAX_SOURCE_BYTES: usize = 1024 * 1024; // 1MB
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024; // 1MB per stream

/// External commands the executors shell out to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchains {
    pub python: String,
    pub node: String,
    pub javac: String,
    pub java: String,
    pub dotnet: String,
    pub maven: String,
}

impl Default for Toolchains {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            node: "node".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
            dotnet: "dotnet".to_string(),
            maven: "mvn".to_string(),
        }
    }
}

impl Toolchains {
    /// (role, command) pairs, used for availability reports
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("python", self.python.as_str()),
            ("node", self.node.as_str()),
            ("javac", self.javac.as_str()),
            ("java", self.java.as_str()),
            ("dotnet", self.dotnet.as_str()),
            ("maven", self.maven.as_str()),
        ]
    }
}

/// Wall-clock budgets per toolchain step, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub interpreted_ms: u64,
    pub compile_ms: u64,
    pub compiled_run_ms: u64,
    pub dotnet_build_ms: u64,
    pub dotnet_run_ms: u64,
    pub framework_probe_ms: u64,
    pub framework_run_ms: u64,
    pub build_tool_ms: u64,
    /// Budget for the external failure-explanation call
    pub explain_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            interpreted_ms: 10_000,
            compile_ms: 10_000,
            compiled_run_ms: 10_000,
            dotnet_build_ms: 30_000,
            dotnet_run_ms: 15_000,
            framework_probe_ms: 10_000,
            framework_run_ms: 30_000,
            build_tool_ms: 60_000,
            explain_ms: 20_000,
        }
    }
}

impl Timeouts {
    fn all(&self) -> [(&'static str, u64); 9] {
        [
            ("interpreted_ms", self.interpreted_ms),
            ("compile_ms", self.compile_ms),
            ("compiled_run_ms", self.compiled_run_ms),
            ("dotnet_build_ms", self.dotnet_build_ms),
            ("dotnet_run_ms", self.dotnet_run_ms),
            ("framework_probe_ms", self.framework_probe_ms),
            ("framework_run_ms", self.framework_run_ms),
            ("build_tool_ms", self.build_tool_ms),
            ("explain_ms", self.explain_ms),
        ]
    }
}

/// Identity the toolchain processes are switched to before exec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAs {
    pub uid: u32,
    pub gid: u32,
}

/// Restrictions applied to every spawned toolchain process.
///
/// All limits are off by default: JVM and .NET reserve large address
/// spaces up front and fail to start under a tight RLIMIT_AS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    pub memory_limit_mb: Option<u64>,
    pub cpu_time_limit_secs: Option<u64>,
    pub max_processes: Option<u64>,
    pub max_file_size_mb: Option<u64>,
    pub disable_core_dumps: bool,
    pub run_as: Option<RunAs>,
    pub clear_env: bool,
    /// Variables passed through when `clear_env` is set
    pub env_allowlist: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            memory_limit_mb: None,
            cpu_time_limit_secs: None,
            max_processes: None,
            max_file_size_mb: None,
            disable_core_dumps: true,
            run_as: None,
            clear_env: false,
            env_allowlist: [
                "PATH",
                "HOME",
                "LANG",
                "LC_ALL",
                "TMPDIR",
                "JAVA_HOME",
                "DOTNET_ROOT",
                "DOTNET_CLI_HOME",
                "MAVEN_HOME",
                "M2_HOME",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub toolchains: Toolchains,
    pub timeouts: Timeouts,
    pub sandbox: SandboxPolicy,
    pub max_concurrent_executions: usize,
    pub max_source_bytes: usize,
    /// Captured bytes kept per stream; the rest is drained and dropped
    pub max_output_bytes: usize,
    /// Parent directory for per-request artifacts; system temp dir if unset
    pub temp_root: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            toolchains: Toolchains::default(),
            timeouts: Timeouts::default(),
            sandbox: SandboxPolicy::default(),
            max_concurrent_executions: 8,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            temp_root: None,
        }
    }
}

impl ExecutorConfig {
    /// Load executor configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Executor config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ExecutorConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default path (config/executor.json)
    pub fn load_default() -> Result<Self> {
        Self::load(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Explicit path if given, else the default file when present, else
    /// built-in defaults. Environment overrides are applied last.
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load_default()?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QUEST_*` overrides from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("QUEST_TEMP_ROOT") {
            self.temp_root = Some(PathBuf::from(root));
        }

        if let Some(value) = lookup("QUEST_MAX_CONCURRENT") {
            self.max_concurrent_executions = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid QUEST_MAX_CONCURRENT: {}", value))?;
        }

        let commands = [
            ("QUEST_PYTHON", &mut self.toolchains.python),
            ("QUEST_NODE", &mut self.toolchains.node),
            ("QUEST_JAVAC", &mut self.toolchains.javac),
            ("QUEST_JAVA", &mut self.toolchains.java),
            ("QUEST_DOTNET", &mut self.toolchains.dotnet),
            ("QUEST_MAVEN", &mut self.toolchains.maven),
        ];
        for (key, slot) in commands {
            if let Some(command) = lookup(key) {
                *slot = command;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_executions == 0 {
            bail!("max_concurrent_executions must be at least 1");
        }
        if self.max_source_bytes == 0 {
            bail!("max_source_bytes must be at least 1");
        }
        if self.max_output_bytes == 0 {
            bail!("max_output_bytes must be at least 1");
        }
        for (name, value) in self.timeouts.all() {
            if value == 0 {
                bail!("timeouts.{} must be greater than zero", name);
            }
        }
        for (role, command) in self.toolchains.entries() {
            if command.trim().is_empty() {
                bail!("toolchains.{} must not be empty", role);
            }
        }
        Ok(())
    }
}
