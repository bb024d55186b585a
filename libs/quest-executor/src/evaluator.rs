/// Result Classifier - Process Outcome to Structured Result
///
/// **Core Responsibility:**
/// Turn a raw `ProcessOutcome` into the `ExecutionResult` handed to the
/// caller, tagged with the failure kind that selects feedback phrasing.
///
/// **Critical Properties:**
/// - Knows nothing about toolchains or workspaces
/// - Pure function: (outcome, output policy) → result
///
/// **Rules:**
/// - Success: stdout is kept (trailing whitespace trimmed when the policy asks)
/// - Any failure: stdout is zeroed and the diagnostic text becomes stderr
/// - Non-zero compile step → CompileError, non-zero run step → RuntimeError
/// - Failed availability probe → ToolchainMissing
use crate::runner::{Phase, ProcessOutcome};
use quest_common::{ExecutionResult, ExitStatus, FailureKind, Language};
use std::fmt;

/// How successful stdout is presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputPolicy {
    pub trim_trailing: bool,
    /// Reported instead of an empty stdout
    pub empty_placeholder: Option<&'static str>,
}

impl OutputPolicy {
    /// Output exactly as the program wrote it
    pub const VERBATIM: OutputPolicy = OutputPolicy {
        trim_trailing: false,
        empty_placeholder: None,
    };

    pub const TRIMMED: OutputPolicy = OutputPolicy {
        trim_trailing: true,
        empty_placeholder: None,
    };

    /// Interpreted languages report trimmed output, compiled ones verbatim
    pub fn for_language(language: Language) -> OutputPolicy {
        if language.is_interpreted() {
            Self::TRIMMED
        } else {
            Self::VERBATIM
        }
    }
}

/// Failure kind for a non-successful outcome; `None` on success
pub fn failure_kind(outcome: &ProcessOutcome) -> Option<FailureKind> {
    match outcome.status {
        ExitStatus::Success => None,
        ExitStatus::NonZeroExit => Some(match outcome.phase {
            Phase::Compile => FailureKind::CompileError,
            Phase::Run => FailureKind::RuntimeError,
            Phase::Probe => FailureKind::ToolchainMissing,
        }),
        ExitStatus::Timeout => Some(FailureKind::Timeout),
        ExitStatus::ToolchainMissing => Some(FailureKind::ToolchainMissing),
        ExitStatus::InternalError => Some(FailureKind::InternalError),
    }
}

/// Classify one outcome into the caller-facing result
pub fn classify(outcome: ProcessOutcome, policy: OutputPolicy) -> ExecutionResult {
    let kind = failure_kind(&outcome);

    let Some(kind) = kind else {
        let mut stdout = if policy.trim_trailing {
            outcome.stdout.trim_end().to_string()
        } else {
            outcome.stdout
        };
        if stdout.trim().is_empty() {
            if let Some(placeholder) = policy.empty_placeholder {
                stdout = placeholder.to_string();
            }
        }
        return ExecutionResult {
            stdout,
            stderr: outcome.stderr,
            exit_status: ExitStatus::Success,
            failure_kind: None,
            environment: None,
            simulated: false,
            execution_time_ms: outcome.elapsed_ms,
        };
    };

    // A failed probe means the toolchain is unusable, whatever the exit code
    let exit_status = match (outcome.status, outcome.phase) {
        (ExitStatus::NonZeroExit, Phase::Probe) => ExitStatus::ToolchainMissing,
        (status, _) => status,
    };

    ExecutionResult {
        stdout: String::new(),
        stderr: diagnostic_text(&outcome),
        exit_status,
        failure_kind: Some(kind),
        environment: None,
        simulated: false,
        execution_time_ms: outcome.elapsed_ms,
    }
}

/// Text passed on as the raw error: stderr, else stdout (test runners
/// report there), else a synthesized exit message
pub fn diagnostic_text(outcome: &ProcessOutcome) -> String {
    if !outcome.stderr.trim().is_empty() {
        return outcome.stderr.clone();
    }
    if !outcome.stdout.trim().is_empty() {
        return outcome.stdout.clone();
    }
    match outcome.exit_code {
        Some(code) => format!("{} exited with code {}", outcome.program, code),
        None => format!("{} failed without output", outcome.program),
    }
}

/// Terminal result for a selector no executor is registered for
pub fn unsupported(requested: &str, framework: Option<&str>) -> ExecutionResult {
    let stderr = match framework {
        Some(framework) => format!(
            "Unsupported language: {} (framework: {})",
            requested, framework
        ),
        None => format!("Unsupported language: {}", requested),
    };
    failed(ExitStatus::ToolchainMissing, FailureKind::UnsupportedLanguage, stderr)
}

/// Result for a failure inside the pipeline itself
pub fn internal_error(error: impl fmt::Display) -> ExecutionResult {
    failed(ExitStatus::InternalError, FailureKind::InternalError, error.to_string())
}

/// Placeholder result from an executor that did not run anything
pub fn simulated(output: impl Into<String>) -> ExecutionResult {
    ExecutionResult {
        stdout: output.into(),
        stderr: String::new(),
        exit_status: ExitStatus::Success,
        failure_kind: None,
        environment: None,
        simulated: true,
        execution_time_ms: 0,
    }
}

fn failed(exit_status: ExitStatus, kind: FailureKind, stderr: String) -> ExecutionResult {
    ExecutionResult {
        stdout: String::new(),
        stderr,
        exit_status,
        failure_kind: Some(kind),
        environment: None,
        simulated: false,
        execution_time_ms: 0,
    }
}
