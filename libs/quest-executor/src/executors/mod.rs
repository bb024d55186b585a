/// Executors - One Capability, Many Toolchains
///
/// Every language and framework strategy implements [`Executor`]. The
/// dispatcher only ever hands out `Arc<dyn Executor>`; it never knows which
/// toolchain sits behind one.
///
/// **Variants:**
/// - `InterpretedExecutor`: python3 / node on a single file
/// - `JavaExecutor`: javac then java
/// - `CsharpExecutor`: dotnet project scaffold, build, run
/// - `PytestExecutor`, `UnittestExecutor`: Python test frameworks
/// - `CucumberExecutor`: Maven project scaffold, compile, test
/// - `SimulatedExecutor`: placeholder that runs nothing and says so
mod csharp;
mod cucumber;
mod interpreted;
mod java;
mod pytest;
mod simulated;
mod unittest;

pub use csharp::CsharpExecutor;
pub use cucumber::CucumberExecutor;
pub use interpreted::InterpretedExecutor;
pub use java::JavaExecutor;
pub use pytest::PytestExecutor;
pub use simulated::{SimulatedExecutor, SIMULATED_FRAMEWORKS};
pub use unittest::UnittestExecutor;

use crate::error::Result;
use crate::normalizer::NormalizedSource;
use crate::runner::ProcessRunner;
use async_trait::async_trait;
use quest_common::{ExecutionResult, Language};

#[async_trait]
pub trait Executor: Send + Sync {
    /// Display name, e.g. "python" or "TestNG"
    fn name(&self) -> &'static str;

    /// Language the submission is normalized for
    fn language(&self) -> Language;

    /// Canned feedback attached to a successful result. Framework runners
    /// and placeholders use it; plain languages return nothing.
    fn success_feedback(&self) -> Option<String> {
        None
    }

    /// Run the normalized source. `Err` is reserved for pipeline failures
    /// (workspace I/O); everything the toolchain does is in the result.
    async fn run(&self, source: &NormalizedSource, runner: &ProcessRunner) -> Result<ExecutionResult>;
}
