use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::normalizer::{NormalizedSource, DEFAULT_ENTRY_CLASS};
use crate::runner::{CommandSpec, Phase, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};
use tracing::debug;

/// `javac` into the workspace, then `java` on the entry class
pub struct JavaExecutor {
    javac: String,
    java: String,
    compile_ms: u64,
    run_ms: u64,
}

impl JavaExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            javac: config.toolchains.javac.clone(),
            java: config.toolchains.java.clone(),
            compile_ms: config.timeouts.compile_ms,
            run_ms: config.timeouts.compiled_run_ms,
        }
    }
}

#[async_trait]
impl Executor for JavaExecutor {
    fn name(&self) -> &'static str {
        "java"
    }

    fn language(&self) -> Language {
        Language::Java
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let entry = source.entry_class.as_deref().unwrap_or(DEFAULT_ENTRY_CLASS);
        let file_name = format!("{}.java", entry);

        let workspace = runner.create_workspace()?;
        workspace.write_file(&file_name, &source.code)?;

        // Compile step: failure short-circuits and compiler output is the error
        let compile = CommandSpec::new(&self.javac, self.compile_ms)
            .args(["-d", "."])
            .arg(&file_name)
            .phase(Phase::Compile);
        let compiled = runner.run(&workspace, &compile).await;
        if !compiled.succeeded() {
            return Ok(evaluator::classify(compiled, OutputPolicy::for_language(Language::Java)));
        }
        debug!(entry_class = entry, compile_ms = compiled.elapsed_ms, "Compiled");

        let run = CommandSpec::new(&self.java, self.run_ms).args(["-cp", ".", entry]);
        let outcome = runner.run(&workspace, &run).await;

        let mut result = evaluator::classify(outcome, OutputPolicy::for_language(Language::Java));
        result.execution_time_ms += compiled.elapsed_ms;
        Ok(result)
    }
}
