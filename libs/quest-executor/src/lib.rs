//! Multi-language code execution core.
//!
//! A request flows classify → normalize → dispatch → run → classify result;
//! [`Orchestrator::execute`] is the entry point and never fails.

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod executors;
pub mod feedback;
pub mod normalizer;
pub mod orchestrator;
pub mod runner;
pub mod sandbox;


pub use config::ExecutorConfig;
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::ExecutionError;
pub use feedback::{ExplainRequest, FailureExplainer, FeedbackError, StaticExplainer};
pub use normalizer::NormalizedSource;
pub use orchestrator::Orchestrator;
pub use runner::ProcessRunner;
