//! Failure explanation seam.
//!
//! On any non-success result the orchestrator asks a [`FailureExplainer`]
//! for learner-facing feedback. The real explainer lives outside this crate;
//! whatever it does, its failure is replaced by [`fallback_feedback`].

use async_trait::async_trait;
use quest_common::{FailureKind, JsEnvironmentKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Everything an explainer gets to see about one failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub failure_kind: FailureKind,
    /// Human-facing language name, e.g. "C#"
    pub language_label: String,
    pub source: String,
    pub diagnostic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<JsEnvironmentKind>,
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("explainer unavailable: {0}")]
    Unavailable(String),

    #[error("explainer did not answer within {0}ms")]
    Timeout(u64),

    #[error("explainer returned an unusable response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait FailureExplainer: Send + Sync {
    /// Free-text (usually JSON) feedback for the failure
    async fn explain(&self, request: &ExplainRequest) -> Result<String, FeedbackError>;
}

/// Explainer that never calls out; answers with the canned text per kind
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticExplainer;

#[async_trait]
impl FailureExplainer for StaticExplainer {
    async fn explain(&self, request: &ExplainRequest) -> Result<String, FeedbackError> {
        Ok(fallback_feedback(request.failure_kind, &request.language_label))
    }
}

/// `{"explanation": ..., "suggestion": ...}` as a JSON string
pub fn guidance(explanation: &str, suggestion: &str) -> String {
    json!({
        "explanation": explanation,
        "suggestion": suggestion,
    })
    .to_string()
}

/// Static feedback used when no explainer answer is available
pub fn fallback_feedback(kind: FailureKind, language_label: &str) -> String {
    match kind {
        FailureKind::CompileError => guidance(
            &format!("Your {} code could not be compiled.", language_label),
            "Read the compiler message above, fix the reported line and try again.",
        ),
        FailureKind::RuntimeError => guidance(
            &format!("Your {} code stopped with an error while running.", language_label),
            "Check the error message above for the failing line and its cause, then fix it and try again.",
        ),
        FailureKind::Timeout => guidance(
            &format!("Your {} code took too long to execute.", language_label),
            "Check for infinite loops or optimize your code.",
        ),
        FailureKind::ToolchainMissing => guidance(
            &format!("The {} toolchain is not installed or not found in PATH.", language_label),
            "Install the required runtime, compiler or framework and make sure it is on PATH.",
        ),
        FailureKind::UnsupportedLanguage => guidance(
            &format!("Execution for {} is not yet supported.", language_label),
            &format!("Try running this code in your local {} environment.", language_label),
        ),
        FailureKind::InternalError => guidance(
            &format!("An unexpected error occurred during {} execution.", language_label),
            "Please check your code syntax and try again.",
        ),
    }
}
