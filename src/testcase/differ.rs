//! The `Differ` capability: "inspect the Runner's exit status plus its
//! captured output."

use async_trait::async_trait;

use super::file_expectations::FileExpectations;
use super::sink::ExecContext;

/// A Differ's inspection. `Err` is an uncaught exception (EXCEPTION);
/// `Ok(())` is a normal return — problems are reported via
/// `ctx.log_error(...)`, which drives ERROR classification, matching
/// Runner's own convention.
pub type DifferInspectResult = Result<(), String>;

/// Polymorphic over "inspect the Runner's exit status plus its captured
/// output"; carries its own file-expectations group merged into the
/// Runner's (§3).
#[async_trait]
pub trait DifferObj: Send + Sync {
    fn name(&self) -> &str;

    fn file_expectations(&self) -> FileExpectations {
        FileExpectations::default()
    }

    async fn inspect(&self, exit_code: i32, runner_output: &str, ctx: &mut ExecContext<'_>) -> DifferInspectResult;
}
