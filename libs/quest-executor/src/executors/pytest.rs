use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::feedback;
use crate::normalizer::NormalizedSource;
use crate::runner::{CommandSpec, Phase, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, ExitStatus, Language};
use tracing::warn;

pub(crate) const TEST_MODULE: &str = "submission_test";

/// Probe for pytest, then run the submission as a test file
pub struct PytestExecutor {
    python: String,
    probe_ms: u64,
    run_ms: u64,
}

impl PytestExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            python: config.toolchains.python.clone(),
            probe_ms: config.timeouts.framework_probe_ms,
            run_ms: config.timeouts.framework_run_ms,
        }
    }
}

#[async_trait]
impl Executor for PytestExecutor {
    fn name(&self) -> &'static str {
        "pytest"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn success_feedback(&self) -> Option<String> {
        Some(feedback::guidance(
            "pytest execution completed successfully!",
            "All tests passed. Great job with your pytest code!",
        ))
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let workspace = runner.create_workspace()?;

        let probe = CommandSpec::new(&self.python, self.probe_ms)
            .args(["-c", "import pytest"])
            .phase(Phase::Probe);
        let mut probed = runner.run(&workspace, &probe).await;
        if !probed.succeeded() {
            if probed.status == ExitStatus::NonZeroExit {
                warn!(python = %self.python, "pytest is not importable");
                probed.stderr = "pytest not installed".to_string();
            }
            return Ok(evaluator::classify(probed, OutputPolicy::VERBATIM));
        }

        let file_name = format!("{}.py", TEST_MODULE);
        workspace.write_file(&file_name, &source.code)?;

        let run = CommandSpec::new(&self.python, self.run_ms)
            .args(["-m", "pytest"])
            .arg(file_name)
            .args(["-v", "-p", "no:cacheprovider"]);
        let outcome = runner.run(&workspace, &run).await;

        Ok(evaluator::classify(outcome, OutputPolicy::VERBATIM))
    }
}
