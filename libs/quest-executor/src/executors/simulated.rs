use super::Executor;
use crate::error::Result;
use crate::evaluator;
use crate::feedback;
use crate::normalizer::NormalizedSource;
use crate::runner::ProcessRunner;
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};

/// (framework, language, suggestion) for every framework that is only
/// simulated
pub const SIMULATED_FRAMEWORKS: [(&str, Language, &str); 6] = [
    (
        "TestNG",
        Language::Java,
        "To run TestNG tests, compile and execute in your local Java environment with TestNG dependencies.",
    ),
    (
        "JUnit",
        Language::Java,
        "To run JUnit tests, compile and execute in your local Java environment with JUnit 5 dependencies.",
    ),
    (
        "Mocha",
        Language::Javascript,
        "To run Mocha tests, use 'npm test' or 'mocha' command in your local Node.js environment.",
    ),
    (
        "Jest",
        Language::Javascript,
        "To run Jest tests, use 'npm test' command in your local Node.js environment with Jest configured.",
    ),
    (
        "NUnit",
        Language::Csharp,
        "To run NUnit tests, compile and execute in your local .NET environment with NUnit packages.",
    ),
    (
        "MSTest",
        Language::Csharp,
        "To run MSTest tests, use 'dotnet test' command in your local .NET environment.",
    ),
];

/// Placeholder for a framework with no real runner: nothing is spawned and
/// the result carries the `simulated` flag
pub struct SimulatedExecutor {
    framework: &'static str,
    language: Language,
    suggestion: &'static str,
}

impl SimulatedExecutor {
    pub fn new(framework: &'static str, language: Language, suggestion: &'static str) -> Self {
        Self {
            framework,
            language,
            suggestion,
        }
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    fn name(&self) -> &'static str {
        self.framework
    }

    fn language(&self) -> Language {
        self.language
    }

    fn success_feedback(&self) -> Option<String> {
        Some(feedback::guidance(
            &format!("{} framework execution is simulated.", self.framework),
            self.suggestion,
        ))
    }

    async fn run(&self, _source: &NormalizedSource, _runner: &ProcessRunner) -> Result<ExecutionResult> {
        Ok(evaluator::simulated(format!("{} execution simulation", self.framework)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::test_support::runner_in;
    use crate::normalizer::normalize;

    #[tokio::test]
    async fn test_simulation_spawns_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (framework, language, suggestion) = SIMULATED_FRAMEWORKS[0];
        let executor = SimulatedExecutor::new(framework, language, suggestion);
        let source = normalize(language, "System.out.println(1);", None);

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert!(result.simulated);
        assert_eq!(result.stdout, "TestNG execution simulation");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_feedback_names_framework() {
        let executor = SimulatedExecutor::new("Jest", Language::Javascript, "use npm test");
        let feedback: serde_json::Value =
            serde_json::from_str(&executor.success_feedback().unwrap()).unwrap();

        assert_eq!(feedback["explanation"], "Jest framework execution is simulated.");
        assert_eq!(feedback["suggestion"], "use npm test");
    }
}
