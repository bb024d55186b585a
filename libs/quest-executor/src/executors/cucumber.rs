use super::Executor;
use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::evaluator::{self, OutputPolicy};
use crate::normalizer::NormalizedSource;
use crate::runner::{CommandSpec, Phase, ProcessRunner};
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};
use tracing::debug;

const CUCUMBER_VERSION: &str = "7.15.0";
const JUNIT_VERSION: &str = "4.13.2";

const TEST_SOURCES: &str = "src/test/java";
const TEST_RESOURCES: &str = "src/test/resources";

/// Minimal Maven project carrying the Cucumber and JUnit test dependencies
fn pom_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0
         http://maven.apache.org/xsd/maven-4.0.0.xsd">
    <modelVersion>4.0.0</modelVersion>
    <groupId>dev.quest</groupId>
    <artifactId>cucumber-submission</artifactId>
    <version>1.0-SNAPSHOT</version>

    <properties>
        <maven.compiler.source>11</maven.compiler.source>
        <maven.compiler.target>11</maven.compiler.target>
        <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
    </properties>

    <dependencies>
        <dependency>
            <groupId>io.cucumber</groupId>
            <artifactId>cucumber-java</artifactId>
            <version>{cucumber}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>io.cucumber</groupId>
            <artifactId>cucumber-junit</artifactId>
            <version>{cucumber}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>{junit}</version>
            <scope>test</scope>
        </dependency>
    </dependencies>
</project>
"#,
        cucumber = CUCUMBER_VERSION,
        junit = JUNIT_VERSION,
    )
}

/// Materialize a Maven scaffold around the submission, then
/// `mvn compile test-compile` and `mvn test`
pub struct CucumberExecutor {
    maven: String,
    step_ms: u64,
}

impl CucumberExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            maven: config.toolchains.maven.clone(),
            step_ms: config.timeouts.build_tool_ms,
        }
    }

    fn mvn<const N: usize>(&self, goals: [&str; N]) -> CommandSpec {
        // Batch mode: no colors, no interactive prompts
        CommandSpec::new(&self.maven, self.step_ms).arg("-B").args(goals)
    }
}

#[async_trait]
impl Executor for CucumberExecutor {
    fn name(&self) -> &'static str {
        "Cucumber"
    }

    fn language(&self) -> Language {
        Language::Java
    }

    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult> {
        let entry = source.entry_class.as_deref().unwrap_or("CucumberTest");

        let workspace = runner.create_workspace()?;
        workspace.write_file("pom.xml", &pom_xml())?;
        workspace.write_file(format!("{}/{}.java", TEST_SOURCES, entry), &source.code)?;
        workspace.create_dir(TEST_RESOURCES)?;
        debug!(entry_class = entry, "Materialized Maven scaffold");

        let compiled = runner
            .run(&workspace, &self.mvn(["compile", "test-compile"]).phase(Phase::Compile))
            .await;
        if !compiled.succeeded() {
            return Ok(evaluator::classify(compiled, OutputPolicy::VERBATIM));
        }

        let outcome = runner.run(&workspace, &self.mvn(["test"])).await;

        let mut result = evaluator::classify(outcome, OutputPolicy::VERBATIM);
        result.execution_time_ms += compiled.elapsed_ms;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::test_support::runner_in;
    use crate::normalizer::normalize;
    use quest_common::{ExitStatus, FailureKind};

    #[test]
    fn test_pom_pins_dependencies() {
        let pom = pom_xml();

        assert!(pom.contains("<artifactId>cucumber-java</artifactId>"));
        assert!(pom.contains("<artifactId>cucumber-junit</artifactId>"));
        assert!(pom.contains(&format!("<version>{}</version>", CUCUMBER_VERSION)));
        assert!(pom.contains(&format!("<version>{}</version>", JUNIT_VERSION)));
    }

    #[tokio::test]
    async fn test_missing_maven_is_toolchain_missing() {
        let root = tempfile::tempdir().unwrap();
        let mut config = ExecutorConfig::default();
        config.toolchains.maven = "quest-missing-mvn".to_string();
        let executor = CucumberExecutor::new(&config);
        let source = normalize(
            Language::Java,
            "import io.cucumber.java.en.Given;\n\npublic class StepDefinitions {\n    @Given(\"a step\")\n    public void aStep() {}\n}\n",
            None,
        );

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.exit_status, ExitStatus::ToolchainMissing);
        assert_eq!(result.failure_kind, Some(FailureKind::ToolchainMissing));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires Maven and network access for dependencies
    async fn test_step_definitions_compile() {
        let root = tempfile::tempdir().unwrap();
        let executor = CucumberExecutor::new(&ExecutorConfig::default());
        let source = normalize(
            Language::Java,
            "import io.cucumber.java.en.Given;\n\npublic class StepDefinitions {\n    @Given(\"a step\")\n    public void aStep() {}\n}\n",
            None,
        );

        let result = executor.run(&source, &runner_in(root.path())).await.unwrap();

        assert_eq!(result.exit_status, ExitStatus::Success);
    }
}
