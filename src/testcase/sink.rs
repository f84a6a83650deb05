//! Explicit per-worker output capture.
//!
//! Rust has no hookable process-wide stdout/stderr the way the originating
//! harness does (a per-thread `sys.stdout` shim); per Design Notes §9 we
//! substitute an explicit sink object threaded through every stage's
//! execution context instead of mutating global state. Each worker owns one
//! [`OutputSink`] per Job, so concurrent workers never observe each other's
//! writes.

use tokio_util::sync::CancellationToken;

/// Captures a stage's output. Handed to Runners/Differs via [`ExecContext`];
/// they must not write to the ambient stdout/stderr.
#[derive(Debug, Default)]
pub struct OutputSink {
    buf: String,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn writeln(&mut self, text: &str) {
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Drain the buffer, leaving it empty for the next stage.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// Execution context passed into a Controller/Runner/Differ's stage.
///
/// Carries the output sink, a cooperative cancellation token (armed by the
/// Scheduler's timeout, §5), and the stage's own accumulated error-level
/// log records (the harness's substitute for "the object's logger
/// reports `status() != OK`").
pub struct ExecContext<'a> {
    pub sink: &'a mut OutputSink,
    pub cancel: CancellationToken,
    errors: Vec<String>,
}

impl<'a> ExecContext<'a> {
    pub fn new(sink: &'a mut OutputSink, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            errors: Vec::new(),
        }
    }

    /// Record an error-level diagnostic on this stage. Per §4.4, any
    /// accumulated error-level record causes an ERROR (or, if recorded
    /// during Controller-driven execution, FATAL) classification.
    pub fn log_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Reset accumulated errors between stages (mirrors `obj.reset()`
    /// clearing log counts before each stage in the original).
    pub fn reset(&mut self) {
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_drains_and_resets() {
        let mut sink = OutputSink::new();
        sink.write("hello");
        sink.writeln(" world");
        assert_eq!(sink.take(), "hello world\n");
        assert_eq!(sink.as_str(), "");
    }

    #[test]
    fn context_tracks_logged_errors() {
        let mut sink = OutputSink::new();
        let mut ctx = ExecContext::new(&mut sink, CancellationToken::new());
        assert!(!ctx.has_error());
        ctx.log_error("boom");
        assert!(ctx.has_error());
        ctx.reset();
        assert!(!ctx.has_error());
    }
}
