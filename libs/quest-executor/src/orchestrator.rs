/// Execution Orchestrator - High-Level Pipeline
///
/// **Responsibility:**
/// Compose the pipeline for one request and always hand back a well-formed
/// response.
///
/// **Pipeline:**
/// 1. Admission (bounded pool) and source-size guardrail
/// 2. Dispatch the selector to an executor (unsupported → terminal result)
/// 3. Classify JavaScript environment, normalize the source
/// 4. Run the executor on its own task (a panic becomes `InternalError`)
/// 5. Attach feedback: canned on success, explainer (with fallback) on failure
///
/// This module is the glue layer - it knows nothing about:
/// - How toolchains are invoked (executors and runner)
/// - How outcomes are judged (evaluator)
use crate::classifier;
use crate::config::ExecutorConfig;
use crate::dispatcher::{target_language, Dispatch, Dispatcher};
use crate::error::ExecutionError;
use crate::evaluator;
use crate::executors::Executor;
use crate::feedback::{fallback_feedback, ExplainRequest, FailureExplainer, FeedbackError, StaticExplainer};
use crate::normalizer::{self, NormalizedSource};
use crate::runner::ProcessRunner;
use quest_common::{ExecutionRequest, ExecutionResult, Language, RunResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

/// Result of the pipeline before feedback is attached
struct Execution {
    result: ExecutionResult,
    /// Name used in feedback text, e.g. "Java" or "Java (Cucumber)"
    label: String,
    success_feedback: Option<String>,
}

pub struct Orchestrator {
    config: ExecutorConfig,
    dispatcher: Dispatcher,
    runner: Arc<ProcessRunner>,
    explainer: Arc<dyn FailureExplainer>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    /// Orchestrator with the built-in executors and static feedback
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_explainer(config, Arc::new(StaticExplainer))
    }

    pub fn with_explainer(config: ExecutorConfig, explainer: Arc<dyn FailureExplainer>) -> Self {
        let dispatcher = Dispatcher::from_config(&config);
        Self::with_dispatcher(config, dispatcher, explainer)
    }

    pub fn with_dispatcher(
        config: ExecutorConfig,
        dispatcher: Dispatcher,
        explainer: Arc<dyn FailureExplainer>,
    ) -> Self {
        let runner = Arc::new(ProcessRunner::new(&config));
        let permits = Arc::new(Semaphore::new(config.max_concurrent_executions.max(1)));
        Self {
            config,
            dispatcher,
            runner,
            explainer,
            permits,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one request end to end. Never fails: every problem is reported
    /// through the response fields.
    #[instrument(skip(self, request), fields(execution_id = %request.id, language = %request.language))]
    pub async fn execute(&self, request: &ExecutionRequest) -> RunResponse {
        let started = Instant::now();
        info!(
            sub_language = ?request.sub_language,
            framework = ?request.framework,
            framework_run = request.is_framework_run,
            source_size = request.source_code.len(),
            "Execution started"
        );

        let execution = self.run_pipeline(request).await;
        let ai_feedback = self.feedback_for(request, &execution).await;
        let result = execution.result;

        info!(
            status = ?result.exit_status,
            failure_kind = ?result.failure_kind,
            simulated = result.simulated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Execution finished"
        );

        let raw_error = if result.is_success() {
            String::new()
        } else {
            result.stderr
        };

        RunResponse {
            execution_id: request.id,
            output: result.stdout,
            raw_error,
            ai_feedback,
            environment: result.environment,
            status: result.exit_status,
            failure_kind: result.failure_kind,
            simulated: result.simulated,
            execution_time_ms: result.execution_time_ms,
        }
    }

    /// Run one request without asking for feedback
    pub async fn execute_raw(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.run_pipeline(request).await.result
    }

    async fn run_pipeline(&self, request: &ExecutionRequest) -> Execution {
        // GUARDRAIL: reject before anything touches the filesystem
        if request.source_code.len() > self.config.max_source_bytes {
            let err = ExecutionError::SourceTooLarge {
                limit: self.config.max_source_bytes,
                actual: request.source_code.len(),
            };
            warn!(error = %err, "Rejected submission");
            return Execution {
                result: evaluator::internal_error(err),
                label: label_for_selector(target_language(request)),
                success_feedback: None,
            };
        }

        let (executor, language, framework) = match self.dispatcher.resolve(request) {
            Dispatch::Executor {
                executor,
                language,
                framework,
            } => (executor, language, framework),
            Dispatch::Unsupported { requested, framework } => {
                warn!(requested = %requested, framework = ?framework, "Unsupported language");
                return Execution {
                    result: evaluator::unsupported(&requested, framework.as_deref()),
                    label: label_for_selector(&requested),
                    success_feedback: None,
                };
            }
        };

        let environment = (language == Language::Javascript)
            .then(|| classifier::classify(&request.source_code));
        let normalized = normalizer::normalize(language, &request.source_code, environment);
        debug!(
            executor = executor.name(),
            environment = ?environment,
            rewritten = normalized.rewritten,
            entry_class = ?normalized.entry_class,
            "Source normalized"
        );

        let label = match framework {
            Some(framework) => format!("{} ({})", language.label(), framework),
            None => language.label().to_string(),
        };
        let success_feedback = executor.success_feedback();
        let result = self.spawn_executor(executor, normalized).await;

        Execution {
            result: result.with_environment(environment),
            label,
            success_feedback,
        }
    }

    /// Run the executor on its own task, holding an admission permit for as
    /// long as the task lives
    async fn spawn_executor(&self, executor: Arc<dyn Executor>, source: NormalizedSource) -> ExecutionResult {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return evaluator::internal_error(ExecutionError::PoolClosed),
        };

        let name = executor.name();
        let runner = Arc::clone(&self.runner);
        let task = tokio::spawn(async move {
            let _permit = permit;
            executor.run(&source, &runner).await
        });

        match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(executor = name, error = %e, "Execution pipeline failed");
                evaluator::internal_error(e)
            }
            Err(join_error) => {
                let err = ExecutionError::ExecutorAborted {
                    executor: name.to_string(),
                    reason: join_error.to_string(),
                };
                error!(error = %err, "Executor task did not complete");
                evaluator::internal_error(err)
            }
        }
    }

    async fn feedback_for(&self, request: &ExecutionRequest, execution: &Execution) -> String {
        let result = &execution.result;
        let Some(kind) = result.failure_kind else {
            return execution.success_feedback.clone().unwrap_or_default();
        };

        let explain = ExplainRequest {
            failure_kind: kind,
            language_label: execution.label.clone(),
            source: request.source_code.clone(),
            diagnostic: result.stderr.clone(),
            environment: result.environment,
        };

        let budget_ms = self.config.timeouts.explain_ms;
        let answer = match tokio::time::timeout(Duration::from_millis(budget_ms), self.explainer.explain(&explain)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => return text,
            Ok(Ok(_)) => FeedbackError::InvalidResponse("empty feedback".to_string()),
            Ok(Err(e)) => e,
            Err(_) => FeedbackError::Timeout(budget_ms),
        };

        warn!(error = %answer, failure_kind = %kind, "Explainer failed; using fallback feedback");
        fallback_feedback(kind, &execution.label)
    }
}

/// Feedback label for a selector that may not be a known language
fn label_for_selector(selector: &str) -> String {
    match Language::from_name(selector) {
        Some(language) => language.label().to_string(),
        None if selector.is_empty() => "this language".to_string(),
        None => selector.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_for_selector() {
        assert_eq!(label_for_selector("cs"), "C#");
        assert_eq!(label_for_selector("ruby"), "ruby");
        assert_eq!(label_for_selector(""), "this language");
    }
}
