// CLI commands for the Quest execution core
use anyhow::{bail, Context, Result};
use quest_common::ExecutionRequest;
use quest_executor::config::DEFAULT_CONFIG_PATH;
use quest_executor::{ExecutorConfig, Orchestrator};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RunOptions {
    pub language: String,
    pub sub_language: Option<String>,
    pub framework: Option<String>,
    pub framework_run: bool,
}

/// Read a file, or stdin for `-`
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_config(config_path: Option<&Path>) -> Result<ExecutorConfig> {
    let config = ExecutorConfig::load_or_default(config_path)?;
    info!(
        max_concurrent = config.max_concurrent_executions,
        temp_root = ?config.temp_root,
        "Loaded executor config"
    );
    Ok(config)
}

async fn execute_and_print(config: ExecutorConfig, request: ExecutionRequest) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    let response = orchestrator.execute(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Execute one source file and print the response
pub async fn run_file(config_path: Option<&Path>, file: &Path, options: RunOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let source = read_input(file)?;

    let mut request = ExecutionRequest::new(options.language, source);
    if let Some(sub_language) = options.sub_language {
        request = request.with_sub_language(sub_language);
    }
    if let Some(framework) = options.framework {
        request = request.with_framework(framework);
    }
    if options.framework_run {
        request = request.framework_run();
    }

    execute_and_print(config, request).await
}

/// Execute a frontend-format JSON payload and print the response
pub async fn run_request(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let payload = read_input(file)?;
    let request: ExecutionRequest =
        serde_json::from_str(&payload).context("Failed to parse request payload")?;

    execute_and_print(config, request).await
}

/// Flag used to ask a toolchain for its version
fn version_flag(role: &str) -> &'static str {
    match role {
        // JDK 8 only understands the single-dash form
        "java" | "javac" => "-version",
        _ => "--version",
    }
}

/// Probe every configured toolchain and print a table
pub async fn check_toolchains(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = Orchestrator::new(config.clone());

    println!("{:<10} {:<30} {:<10} {}", "Role", "Command", "Status", "Version");
    println!("{}", "─".repeat(80));

    let mut missing = 0;
    for (role, command) in config.toolchains.entries() {
        let (status, version) = match probe(command, version_flag(role)).await {
            Some(version) => ("found", version),
            None => {
                missing += 1;
                ("missing", String::new())
            }
        };
        println!("{:<10} {:<30} {:<10} {}", role, command, status, version);
    }

    println!("\nFrameworks: {}", orchestrator.dispatcher().frameworks().join(", "));
    if missing > 0 {
        println!("\n⚠️  {} toolchain(s) missing; requests needing them report ToolchainMissing", missing);
    }

    Ok(())
}

/// First line of the version banner, or `None` when the command cannot run
async fn probe(command: &str, flag: &str) -> Option<String> {
    let child = Command::new(command)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(PROBE_TIMEOUT, child).await {
        Ok(Ok(output)) => {
            // java -version prints to stderr
            let banner = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            Some(
                String::from_utf8_lossy(&banner)
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string(),
            )
        }
        Ok(Err(e)) => {
            warn!(command, error = %e, "Toolchain probe failed");
            None
        }
        Err(_) => {
            warn!(command, "Toolchain probe timed out");
            None
        }
    }
}

/// Write `config/executor.json` with every default spelled out
pub fn init_config(project_path: &Path, force: bool) -> Result<()> {
    let config_path = project_path.join(DEFAULT_CONFIG_PATH);
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(&ExecutorConfig::default())?;
    fs::write(&config_path, content + "\n")
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("✅ Created: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();

        init_config(dir.path(), false).unwrap();
        let loaded = ExecutorConfig::load(&dir.path().join(DEFAULT_CONFIG_PATH)).unwrap();

        assert_eq!(loaded, ExecutorConfig::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        assert!(init_config(dir.path(), false).is_err());
        assert!(init_config(dir.path(), true).is_ok());
    }

    #[test]
    fn test_version_flags() {
        assert_eq!(version_flag("javac"), "-version");
        assert_eq!(version_flag("python"), "--version");
    }

    #[tokio::test]
    async fn test_probe_missing_command() {
        assert!(probe("quest-missing-toolchain", "--version").await.is_none());
    }
}
