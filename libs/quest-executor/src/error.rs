//! Internal failure sources. None of these reach the caller as errors; the
//! orchestrator turns them into `InternalError` results.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Creating or writing the per-request artifact failed.
    #[error("failed to prepare execution workspace: {0}")]
    Workspace(#[source] std::io::Error),

    /// Submission rejected before anything was spawned.
    #[error("source code exceeds maximum size of {limit} bytes ({actual} bytes submitted)")]
    SourceTooLarge { limit: usize, actual: usize },

    /// The executor task panicked or was aborted.
    #[error("executor '{executor}' aborted: {reason}")]
    ExecutorAborted { executor: String, reason: String },

    /// The admission pool was closed while the request waited.
    #[error("execution pool is shut down")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
