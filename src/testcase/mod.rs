//! The test case execution engine: drives one Runner and its Differs
//! through the Progress state machine and classifies a Result (§4.4).

pub mod builtins;
mod case;
pub mod controller;
pub mod differ;
pub mod file_expectations;
pub mod progress;
pub mod result;
pub mod sink;
pub mod runner;

pub use case::TestCase;
pub use controller::{Controller, DefaultController};
pub use differ::DifferObj;
pub use file_expectations::FileExpectations;
pub use progress::Progress;
pub use result::{Color, TestResult};
pub use runner::RunnerObj;
pub use sink::{ExecContext, OutputSink};

/// An object produced by the [`Parser`](crate::parser::Parser)/[`Factory`](crate::factory::Factory):
/// either a Runner or a Differ, since both are registered in the same
/// type-name keyed registry (§4.2).
pub enum WarehouseEntry {
    Runner(Box<dyn RunnerObj>),
    Differ(Box<dyn DifferObj>),
}

impl WarehouseEntry {
    pub fn name(&self) -> &str {
        match self {
            WarehouseEntry::Runner(r) => r.name(),
            WarehouseEntry::Differ(d) => d.name(),
        }
    }

    pub fn as_runner(&self) -> Option<&dyn RunnerObj> {
        match self {
            WarehouseEntry::Runner(r) => Some(r.as_ref()),
            WarehouseEntry::Differ(_) => None,
        }
    }

    pub fn as_differ(&self) -> Option<&dyn DifferObj> {
        match self {
            WarehouseEntry::Differ(d) => Some(d.as_ref()),
            WarehouseEntry::Runner(_) => None,
        }
    }
}
