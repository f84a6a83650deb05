//! Test reporting and output generation.
//!
//! Grounded on the teacher's `report.rs`: a [`Reporter`] trait receiving
//! lifecycle callbacks, a [`NullReporter`] and [`MultiReporter`], and a
//! [`ConsoleReporter`] that colors status text with `console::style`. The
//! teacher's progress bar (`indicatif`) is dropped — the scheduler's own
//! dispatch loop already emits a periodic "still running" line per Job
//! (`scheduler::pool::run_batch`'s ticker), which a bar would fight with.

use async_trait::async_trait;

use crate::scheduler::{JobOutcome, RunSummary};
use crate::testcase::{Color, TestResult};

/// Trait for receiving test execution events. `Send + Sync` since events
/// may arrive from concurrently-running Jobs.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn on_run_start(&self, total: usize);

    /// A periodic "still running" line for a long TestCase.
    async fn on_progress(&self, line: &str);

    async fn on_job_complete(&self, outcome: &JobOutcome);

    async fn on_run_complete(&self, summary: &RunSummary);
}

/// Discards all events. Useful for tests and `--quiet` runs.
pub struct NullReporter;

#[async_trait]
impl Reporter for NullReporter {
    async fn on_run_start(&self, _total: usize) {}
    async fn on_progress(&self, _line: &str) {}
    async fn on_job_complete(&self, _outcome: &JobOutcome) {}
    async fn on_run_complete(&self, _summary: &RunSummary) {}
}

/// Forwards every event to each child reporter in order.
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

#[async_trait]
impl Reporter for MultiReporter {
    async fn on_run_start(&self, total: usize) {
        for r in &self.reporters {
            r.on_run_start(total).await;
        }
    }

    async fn on_progress(&self, line: &str) {
        for r in &self.reporters {
            r.on_progress(line).await;
        }
    }

    async fn on_job_complete(&self, outcome: &JobOutcome) {
        for r in &self.reporters {
            r.on_job_complete(outcome).await;
        }
    }

    async fn on_run_complete(&self, summary: &RunSummary) {
        for r in &self.reporters {
            r.on_run_complete(summary).await;
        }
    }
}

/// Terminal reporter: one colored line per finished Job, a summary table
/// at the end.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn styled(result: TestResult) -> console::StyledObject<&'static str> {
    let text = result.display();
    match result.color() {
        Color::Single("cyan") => console::style(text).cyan(),
        Color::Single("green") => console::style(text).green(),
        Color::Single("red") => console::style(text).red(),
        Color::Single("magenta") => console::style(text).magenta(),
        Color::Pair(_, _) => console::style(text).white().on_red().bold(),
        Color::Single(_) => console::style(text),
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn on_run_start(&self, total: usize) {
        println!("Running {total} test(s)");
    }

    async fn on_progress(&self, line: &str) {
        if self.verbose {
            println!("{line}");
        }
    }

    async fn on_job_complete(&self, outcome: &JobOutcome) {
        if self.verbose || outcome.result != TestResult::Pass {
            let caveats = if outcome.caveats.is_empty() {
                String::new()
            } else {
                format!(" [{}]", outcome.caveats.join(", "))
            };
            if self.verbose {
                println!(
                    "{} {}{} ({})",
                    styled(outcome.result),
                    outcome.name,
                    caveats,
                    outcome.finished_at.to_rfc3339()
                );
            } else {
                println!("{} {}{}", styled(outcome.result), outcome.name, caveats);
            }
        }
    }

    async fn on_run_complete(&self, summary: &RunSummary) {
        let counts = summary.counts();
        println!();
        println!("Ran {} test(s)", summary.outcomes.len());
        for label in ["OK", "SKIP", "ERROR", "EXCEPTION", "FATAL"] {
            if let Some(&n) = counts.get(label) {
                println!("  {label}: {n}");
            }
        }
        if summary.exit_code() == 0 {
            println!("{}", console::style("All tests passed.").green().bold());
        } else {
            println!("{}", console::style("Some tests did not pass.").red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_reporter_accepts_every_event() {
        let reporter = NullReporter;
        reporter.on_run_start(3).await;
        reporter.on_progress("x").await;
        reporter.on_run_complete(&RunSummary::default()).await;
    }

    #[tokio::test]
    async fn multi_reporter_forwards_to_children() {
        let reporter = MultiReporter::new().with_reporter(NullReporter).with_reporter(ConsoleReporter::new(false));
        reporter.on_run_start(1).await;
    }
}
