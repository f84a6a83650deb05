//! # harness
//!
//! A hierarchical, block-configured test runner: a file full of
//! `[name] key = value ... []` blocks is parsed into typed Runner/Differ
//! objects, each wrapped in a scheduling [`Job`](scheduler::Job), and
//! dispatched across a slot budget respecting declared dependencies.
//!
//! ## Architecture
//!
//! ### Parameters and construction ([`paramset`], [`factory`])
//!
//! A [`paramset::ParamSet`] is both the schema and the storage for one
//! object's constructor arguments. The [`factory::Factory`] is a registry
//! from type name to a schema producer and a constructor; it is populated
//! once at startup by [`testcase::builtins::register_builtins`] and any
//! other plugin crates linked in.
//!
//! ### Parsing ([`parser`])
//!
//! [`parser::parse_file`] walks the bracketed block format, checks for
//! duplicate blocks and parameters, and dispatches every leaf block to the
//! Factory, appending constructed objects to a [`warehouse::Warehouse`].
//! Malformed blocks are collected as diagnostics rather than aborting the
//! whole parse.
//!
//! ### Test execution ([`testcase`])
//!
//! A [`testcase::TestCase`] drives one Runner and its Differs through the
//! [`testcase::Progress`] state machine, classifying a final
//! [`testcase::TestResult`].
//!
//! ### Scheduling ([`scheduler`])
//!
//! The [`scheduler::Scheduler`] dispatches [`scheduler::Job`]s in
//! dependency order, respecting a total slot budget and skipping
//! downstream Jobs when a prerequisite doesn't pass. The
//! [`scheduler::QueueManager`] is the plugin point for handing batches of
//! Jobs to a third-party batch queue instead of running them directly.
//!
//! ### Configuration ([`config`])
//!
//! The harness's own settings (slot budget, timeouts, logging) are loaded
//! from a small TOML file, distinct from the bespoke block format used for
//! test declarations.
//!
//! ### Reporting ([`report`])
//!
//! [`report::Reporter`] receives lifecycle callbacks as Jobs are
//! dispatched and finish; [`report::ConsoleReporter`] is the default
//! terminal implementation.

pub mod config;
pub mod error;
pub mod factory;
pub mod paramset;
pub mod parser;
pub mod report;
pub mod scheduler;
pub mod testcase;
pub mod warehouse;

pub use config::{Config, load_config};
pub use factory::Factory;
pub use paramset::{ParamSet, Value, ValueKind};
pub use parser::{ParseOutcome, parse_file, parse_str};
pub use report::{ConsoleReporter, MultiReporter, NullReporter, Reporter};
pub use scheduler::{Job, JobOutcome, QueueManager, RunSummary, Scheduler};
pub use testcase::{TestCase, TestResult, WarehouseEntry};
pub use warehouse::Warehouse;
