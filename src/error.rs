//! Error taxonomy for the harness.
//!
//! Each subsystem gets its own `thiserror`-derived enum rather than one
//! grab-bag error type, mirroring how this codebase already splits
//! `ProviderError` / `FrameworkError` by subsystem. A [`Locus`] attaches
//! `(file, line, block path)` to diagnostics when available, per the error
//! handling design.

use std::fmt;

use crate::paramset::ValueKind;

/// Source location of a diagnostic: file, line, and the configuration
/// block path it concerns. All fields are optional since not every error
/// originates from parsed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locus {
    pub file: Option<String>,
    pub line: Option<usize>,
    pub block_path: Option<String>,
}

impl Locus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_block_path(mut self, path: impl Into<String>) -> Self {
        self.block_path = Some(path.into());
        self
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, &self.block_path) {
            (Some(file), Some(line), Some(path)) => write!(f, "{file}:{line} [{path}]"),
            (Some(file), Some(line), None) => write!(f, "{file}:{line}"),
            (Some(file), None, Some(path)) => write!(f, "{file} [{path}]"),
            (None, None, Some(path)) => write!(f, "[{path}]"),
            (Some(file), None, None) => write!(f, "{file}"),
            _ => write!(f, "<no locus>"),
        }
    }
}

/// Errors raised by [`ParamSet`](crate::paramset::ParamSet) assignment.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamSetError {
    #[error("parameter '{name}' expected a {expected:?} value but found a {found:?} value")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("parameter '{0}' is immutable and already has a value")]
    ImmutableViolation(String),

    #[error("parameter '{name}' failed verification: {message}")]
    VerifyFailed { name: String, message: String },

    #[error("parameter '{0}' is not declared on this ParamSet")]
    UnknownParameter(String),
}

/// Errors raised by the [`Factory`](crate::factory::Factory).
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("invalid parameters for type '{type_name}': missing required key(s): {missing:?}")]
    InvalidParams {
        type_name: String,
        missing: Vec<String>,
    },

    #[error("construction of type '{type_name}' failed: {message}")]
    ConstructionFailed { type_name: String, message: String },
}

/// Non-fatal parser diagnostics, accumulated rather than propagated (see
/// §7's propagation policy: a construction failure in one block never
/// aborts parsing of unrelated blocks).
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("{locus}: failed to parse configuration: {message}")]
    ConfigParseError { locus: Locus, message: String },

    #[error("{locus}: duplicate block")]
    DuplicateBlock { locus: Locus },

    #[error("{locus}: duplicate parameter")]
    DuplicateParameter { locus: Locus },

    #[error("{locus}: missing 'type' parameter")]
    MissingType { locus: Locus },

    #[error("{locus}: unknown type '{type_name}'")]
    UnknownType { locus: Locus, type_name: String },

    #[error("{locus}: unused parameter '{name}'")]
    UnusedParameter { locus: Locus, name: String },

    #[error("{locus}: block looks like a test declaration but has child blocks")]
    AmbiguousBlock { locus: Locus },

    #[error("{locus}: top-level block '{name}' ignored; only the first top-level block is the iteration root")]
    ExtraTopLevelBlock { locus: Locus, name: String },

    #[error("{locus}: failed to construct object of type '{type_name}': {message}")]
    ConstructionFailed {
        locus: Locus,
        type_name: String,
        message: String,
    },
}

impl ParserError {
    /// True for diagnostics that are warnings rather than fatal-to-the-block
    /// errors (only `UnusedParameter` per §7).
    pub fn is_warning(&self) -> bool {
        matches!(self, ParserError::UnusedParameter { .. } | ParserError::ExtraTopLevelBlock { .. })
    }

    pub fn locus(&self) -> &Locus {
        match self {
            ParserError::ConfigParseError { locus, .. }
            | ParserError::DuplicateBlock { locus }
            | ParserError::DuplicateParameter { locus }
            | ParserError::MissingType { locus }
            | ParserError::UnknownType { locus, .. }
            | ParserError::UnusedParameter { locus, .. }
            | ParserError::AmbiguousBlock { locus }
            | ParserError::ExtraTopLevelBlock { locus, .. }
            | ParserError::ConstructionFailed { locus, .. } => locus,
        }
    }
}

/// Errors raised by the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("prerequisite cycle detected among jobs: {0:?}")]
    PrereqCycle(Vec<String>),

    #[error("job '{0}' timed out")]
    Timeout(String),

    #[error("job '{0}' was cancelled")]
    CancellationRequested(String),

    #[error("subprocess for job '{job}' failed: {message}")]
    SubprocessFailed { job: String, message: String },

    #[error("external queue failure for job '{job}': {message}")]
    ExternalQueueFailure { job: String, message: String },
}

/// Errors raised while checking a Runner/Differ's file expectations.
#[derive(Debug, thiserror::Error)]
pub enum FileExpectationError {
    #[error("expected file(s) not absolute: {0:?}")]
    NotAbsolute(Vec<String>),

    #[error("expected file(s) tracked by version control: {0:?}")]
    VersionControlled(Vec<String>),

    #[error("expected file(s) already exist before execution: {0:?}")]
    AlreadyExists(Vec<String>),

    #[error("expected file(s) not created: {0:?}")]
    NotCreated(Vec<String>),

    #[error("unexpected file(s) created: {0:?}")]
    UnexpectedlyCreated(Vec<String>),

    #[error("'check_created' requires 'file.base' to be set")]
    CheckCreatedRequiresBase,

    #[error("i/o error while checking expected files: {0}")]
    Io(String),
}
