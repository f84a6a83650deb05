//! The optional capability-gate consulted before running a Runner or Differ.
//!
//! Grounded on `original_source/moosetools/moosetest/tests/test_Controller.py`:
//! a Controller is runnable by default, may be toggled via `skip`/`reset`,
//! and its own `execute` is a no-op unless overridden. The default
//! Controller used throughout this crate performs no gating; it exists so
//! that §4.4's classification tree is expressed uniformly whether or not a
//! real gating Controller is configured.

use async_trait::async_trait;

use super::sink::ExecContext;

#[async_trait]
pub trait Controller: Send + Sync {
    /// Whether the gated object should run at all. `false` classifies the
    /// stage as SKIP.
    fn is_runnable(&self) -> bool {
        true
    }

    /// Run the Controller's own checks against the gated object. Returning
    /// `Err` is a Controller-level exception (FATAL); logging an error via
    /// `ctx.log_error` before returning `Ok` is also FATAL, per §4.4 — a
    /// harness-level failure distinct from the object's own test failure.
    async fn execute(&self, _ctx: &mut ExecContext<'_>) -> Result<(), String> {
        Ok(())
    }
}

/// Always-runnable, no-op Controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultController;

#[async_trait]
impl Controller for DefaultController {}
