use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::normalizer::NormalizedSource;
use crate::runner::{CommandSpec, Phase, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};

/// Keeps the dotnet CLI quiet and offline-friendly
const DOTNET_ENV: [(&str, &str); 3] = [
    ("DOTNET_CLI_TELEMETRY_OPTOUT", "1"),
    ("DOTNET_NOLOGO", "1"),
    ("DOTNET_SKIP_FIRST_TIME_EXPERIENCE", "1"),
];

/// Scaffold a console project with the installed SDK's template, replace
/// its Program.cs, build, run
pub struct CsharpExecutor {
    dotnet: String,
    build_ms: u64,
    run_ms: u64,
}

impl CsharpExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            dotnet: config.toolchains.dotnet.clone(),
            build_ms: config.timeouts.dotnet_build_ms,
            run_ms: config.timeouts.dotnet_run_ms,
        }
    }

    fn dotnet(&self, timeout_ms: u64) -> CommandSpec {
        DOTNET_ENV
            .iter()
            .fold(CommandSpec::new(&self.dotnet, timeout_ms), |spec, (k, v)| spec.env(*k, *v))
    }
}

#[async_trait]
impl Executor for CsharpExecutor {
    fn name(&self) -> &'static str {
        "csharp"
    }

    fn language(&self) -> Language {
        Language::Csharp
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let workspace = runner.create_workspace()?;

        // A failed scaffold means the SDK is unusable, not that the code is wrong
        let scaffold = self
            .dotnet(self.build_ms)
            .args(["new", "console", "--force", "--name", "Program", "--output", "."])
            .phase(Phase::Probe);
        let scaffolded = runner.run(&workspace, &scaffold).await;
        if !scaffolded.succeeded() {
            return Ok(evaluator::classify(scaffolded, OutputPolicy::for_language(Language::Csharp)));
        }

        workspace.write_file("Program.cs", &source.code)?;

        let build = self
            .dotnet(self.build_ms)
            .args(["build", "-nologo", "-clp:NoSummary;ErrorsOnly"])
            .phase(Phase::Compile);
        let built = runner.run(&workspace, &build).await;
        if !built.succeeded() {
            return Ok(evaluator::classify(built, OutputPolicy::for_language(Language::Csharp)));
        }

        let run = self.dotnet(self.run_ms).args(["run", "--no-build"]);
        let outcome = runner.run(&workspace, &run).await;

        let mut result = evaluator::classify(outcome, OutputPolicy::for_language(Language::Csharp));
        result.execution_time_ms += scaffolded.elapsed_ms + built.elapsed_ms;
        Ok(result)
    }
}
