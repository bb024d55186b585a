pub mod types;

pub use types::{
    ExecutionRequest, ExecutionResult, ExitStatus, FailureKind, JsEnvironmentKind, Language,
    RunResponse, SELENIUM_CATEGORY,
};
