use super::pytest::TEST_MODULE;
use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::feedback;
use crate::normalizer::NormalizedSource;
use crate::runner::{CommandSpec, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};

/// `python -m unittest <module> -v` over the submission
pub struct UnittestExecutor {
    python: String,
    run_ms: u64,
}

impl UnittestExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            python: config.toolchains.python.clone(),
            run_ms: config.timeouts.framework_run_ms,
        }
    }
}

#[async_trait]
impl Executor for UnittestExecutor {
    fn name(&self) -> &'static str {
        "unittest"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn success_feedback(&self) -> Option<String> {
        Some(feedback::guidance(
            "unittest execution completed.",
            "Check the test results above for any failures or errors.",
        ))
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let workspace = runner.create_workspace()?;
        workspace.write_file(format!("{}.py", TEST_MODULE), &source.code)?;

        let run = CommandSpec::new(&self.python, self.run_ms).args(["-m", "unittest", TEST_MODULE, "-v"]);
        let mut outcome = runner.run(&workspace, &run).await;

        // unittest writes its report to stderr; on success that report is the output
        if outcome.succeeded() && outcome.stdout.trim().is_empty() {
            outcome.stdout = std::mem::take(&mut outcome.stderr);
        }

        Ok(evaluator::classify(outcome, OutputPolicy::VERBATIM))
    }
}
