use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Top-level selector that names a category of exercises rather than a
/// language; the concrete language then comes from `sub_language`.
pub const SELENIUM_CATEGORY: &str = "selenium";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    Csharp,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Javascript,
        Language::Java,
        Language::Csharp,
    ];

    /// Parse a selector as sent by the frontend. Unknown names yield `None`
    /// so the dispatcher can report them instead of failing.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Some(Language::Python),
            "javascript" | "js" | "node" => Some(Language::Javascript),
            "java" => Some(Language::Java),
            "csharp" | "c#" | "cs" => Some(Language::Csharp),
            _ => None,
        }
    }

    /// Human-facing name used in feedback text
    pub fn label(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Javascript => "JavaScript",
            Language::Java => "Java",
            Language::Csharp => "C#",
        }
    }

    /// Interpreted languages run straight from source and get their
    /// successful stdout trimmed of trailing whitespace.
    pub fn is_interpreted(&self) -> bool {
        matches!(self, Language::Python | Language::Javascript)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Javascript => write!(f, "javascript"),
            Language::Java => write!(f, "java"),
            Language::Csharp => write!(f, "csharp"),
        }
    }
}

/// One learner submission, as handed over by the HTTP layer.
///
/// Field names on the wire follow the frontend payload (`code`,
/// `subLanguage`, `isSelenium`, `framework`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "code", alias = "sourceCode")]
    pub source_code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub sub_language: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(rename = "isSelenium", alias = "isFrameworkRun", default)]
    pub is_framework_run: bool,
}

fn default_language() -> String {
    "python".to_string()
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_code: source_code.into(),
            language: language.into(),
            sub_language: None,
            framework: None,
            is_framework_run: false,
        }
    }

    pub fn with_sub_language(mut self, sub_language: impl Into<String>) -> Self {
        self.sub_language = Some(sub_language.into());
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn framework_run(mut self) -> Self {
        self.is_framework_run = true;
        self
    }
}

/// Where a JavaScript snippet expects to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsEnvironmentKind {
    Browser,
    Node,
    Vanilla,
}

impl fmt::Display for JsEnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JsEnvironmentKind::Browser => write!(f, "browser"),
            JsEnvironmentKind::Node => write!(f, "node"),
            JsEnvironmentKind::Vanilla => write!(f, "vanilla"),
        }
    }
}

/// How the toolchain process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    Success,
    NonZeroExit,
    Timeout,
    ToolchainMissing,
    InternalError,
}

/// Failure taxonomy used to pick feedback phrasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    CompileError,
    RuntimeError,
    Timeout,
    ToolchainMissing,
    UnsupportedLanguage,
    InternalError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FailureKind::CompileError => "compile error",
            FailureKind::RuntimeError => "runtime error",
            FailureKind::Timeout => "timeout",
            FailureKind::ToolchainMissing => "toolchain missing",
            FailureKind::UnsupportedLanguage => "unsupported language",
            FailureKind::InternalError => "internal error",
        };
        write!(f, "{}", name)
    }
}

/// Classified outcome of one execution, before feedback is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: ExitStatus,
    pub failure_kind: Option<FailureKind>,
    pub environment: Option<JsEnvironmentKind>,
    /// Set by placeholder executors that did not run anything
    pub simulated: bool,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.failure_kind.is_none()
    }

    pub fn with_environment(mut self, environment: Option<JsEnvironmentKind>) -> Self {
        self.environment = environment;
        self
    }
}

/// Response handed back to the caller. Failures are expressed through the
/// fields, never through a transport error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub execution_id: Uuid,
    pub output: String,
    pub raw_error: String,
    pub ai_feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<JsEnvironmentKind>,
    pub status: ExitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default)]
    pub simulated: bool,
    #[serde(default)]
    pub execution_time_ms: u64,
}
