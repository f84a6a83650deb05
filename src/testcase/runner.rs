//! The `Runner` capability: "execute a task and return an integer status
//! plus captured output."

use std::time::Duration;

use async_trait::async_trait;

use super::file_expectations::FileExpectations;
use super::sink::ExecContext;

/// A Runner's own `execute`. `Err` is an uncaught exception (classified
/// EXCEPTION); `Ok(exit_code)` is a normal return, regardless of whether
/// `exit_code` is zero (the exit code is not analyzed by the TestCase
/// itself — only `ctx.has_error()` drives ERROR classification).
pub type RunnerExecuteResult = Result<i32, String>;

/// Polymorphic over "execute a task and return an integer status plus
/// captured output" (§3). Child types override `execute`; everything else
/// has a sensible default, matching the "base class supplies defaults"
/// idiom adapted to a trait with default methods (Design Notes §9).
#[async_trait]
pub trait RunnerObj: Send + Sync {
    fn name(&self) -> &str;

    /// Names of sibling Differ objects (in the same Warehouse) to run after
    /// this Runner.
    fn differs(&self) -> &[String] {
        &[]
    }

    /// Names of sibling Runner objects that must finish (non-failing)
    /// before this one is dispatched.
    fn prereqs(&self) -> &[String] {
        &[]
    }

    /// Scheduler slot demand (default 1).
    fn slots(&self) -> u32 {
        1
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(900)
    }

    fn file_expectations(&self) -> FileExpectations {
        FileExpectations::default()
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>) -> RunnerExecuteResult;
}
