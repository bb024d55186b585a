use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::normalizer::NormalizedSource;
use crate::runner::{CommandSpec, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};

const JS_NO_OUTPUT: &str = "Code executed successfully (no output)";

/// Single-file interpreter run: write the source, hand it to the interpreter
pub struct InterpretedExecutor {
    name: &'static str,
    language: Language,
    program: String,
    file_name: &'static str,
    timeout_ms: u64,
    policy: OutputPolicy,
}

impl InterpretedExecutor {
    pub fn python(config: &ExecutorConfig) -> Self {
        Self {
            name: "python",
            language: Language::Python,
            program: config.toolchains.python.clone(),
            file_name: "main.py",
            timeout_ms: config.timeouts.interpreted_ms,
            policy: OutputPolicy::for_language(Language::Python),
        }
    }

    pub fn javascript(config: &ExecutorConfig) -> Self {
        Self {
            name: "javascript",
            language: Language::Javascript,
            program: config.toolchains.node.clone(),
            file_name: "main.js",
            timeout_ms: config.timeouts.interpreted_ms,
            policy: OutputPolicy {
                empty_placeholder: Some(JS_NO_OUTPUT),
                ..OutputPolicy::for_language(Language::Javascript)
            },
        }
    }
}

#[async_trait]
impl Executor for InterpretedExecutor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn language(&self) -> Language {
        self.language
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let workspace = runner.create_workspace()?;
        workspace.write_file(self.file_name, &source.code)?;

        let spec = CommandSpec::new(&self.program, self.timeout_ms).arg(self.file_name);
        let outcome = runner.run(&workspace, &spec).await;

        Ok(evaluator::classify(outcome, self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::test_support::{command_available, runner_in};
    use crate::normalizer::normalize;
    use quest_common::{ExitStatus, FailureKind};

    #[tokio::test]
    async fn test_python_output_is_trimmed() {
        if !command_available("python3") {
            eprintln!("python3 not available; skipping");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let executor = InterpretedExecutor::python(&ExecutorConfig::default());
        let source = normalize(Language::Python, "print('hi')\nprint()\n", None);

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.exit_status, ExitStatus::Success);
        assert_eq!(result.stdout, "hi");
    }

    #[tokio::test]
    async fn test_python_exception_is_runtime_error() {
        if !command_available("python3") {
            eprintln!("python3 not available; skipping");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let executor = InterpretedExecutor::python(&ExecutorConfig::default());
        let source = normalize(Language::Python, "print('before')\nprint(1/0)\n", None);

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.failure_kind, Some(FailureKind::RuntimeError));
        assert_eq!(result.stdout, "");
        assert!(result.stderr.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_javascript_without_output_gets_placeholder() {
        if !command_available("node") {
            eprintln!("node not available; skipping");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let executor = InterpretedExecutor::javascript(&ExecutorConfig::default());
        let source = normalize(Language::Javascript, "const x = 1 + 1;", None);

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.stdout, JS_NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let root = tempfile::tempdir().unwrap();
        let mut config = ExecutorConfig::default();
        config.toolchains.node = "quest-missing-node".to_string();
        let executor = InterpretedExecutor::javascript(&config);
        let source = normalize(Language::Javascript, "console.log(1)", None);

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.exit_status, ExitStatus::ToolchainMissing);
        assert_eq!(result.failure_kind, Some(FailureKind::ToolchainMissing));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
