//! Drives one Runner and its Differs through the Progress state machine and
//! classifies a Result, per §4.4. Grounded on
//! `original_source/moosetools/testharness/base/TestCase.py`'s `execute` /
//! `executeObject`.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::controller::{Controller, DefaultController};
use super::differ::DifferObj;
use super::file_expectations::FileExpectationChecker;
use super::progress::Progress;
use super::result::TestResult;
use super::runner::RunnerObj;
use super::sink::{ExecContext, OutputSink};

/// Output captured from one stage (Controller+Runner, or a single Differ),
/// kept for rendering by a [`Reporter`](crate::report::Reporter).
pub struct StageOutput {
    pub stage_name: String,
    pub result: TestResult,
    pub output: String,
}

/// Owns exactly one Runner, a sequence of Differs, a Progress state, and a
/// Result state (§3).
pub struct TestCase {
    id: Uuid,
    runner: Box<dyn RunnerObj>,
    differs: Vec<Box<dyn DifferObj>>,
    controller: Box<dyn Controller>,
    progress: Progress,
    result: Option<TestResult>,
    stages: Vec<StageOutput>,
    start_time: Option<Instant>,
    progress_interval: Duration,
}

impl TestCase {
    pub fn new(runner: Box<dyn RunnerObj>, differs: Vec<Box<dyn DifferObj>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            runner,
            differs,
            controller: Box::new(DefaultController),
            progress: Progress::Waiting,
            result: None,
            stages: Vec::new(),
            start_time: None,
            progress_interval: Duration::from_secs(5),
        }
    }

    pub fn with_controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        self.runner.name()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn result(&self) -> Option<TestResult> {
        self.result
    }

    pub fn stages(&self) -> &[StageOutput] {
        &self.stages
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn progress_interval(&self) -> Duration {
        self.progress_interval
    }

    fn set_progress(&mut self, next: Progress) {
        assert!(next >= self.progress, "Progress must move forward, never backwards");
        self.progress = next;
    }

    /// Render the final result and transition CLOSED (terminal). Idempotent
    /// only the first time; subsequent calls return `None`.
    pub fn close(&mut self) -> Option<TestResult> {
        if self.progress == Progress::Finished {
            self.set_progress(Progress::Closed);
            self.result
        } else {
            None
        }
    }

    /// Record a Result obtained out-of-band (e.g. reaped from a third-party
    /// queue results file) without actually driving the Runner/Differs.
    /// Grounded on `QueueManager._setJobStatus`, which assigns `tester`'s
    /// status directly from a JSON blob rather than re-executing anything.
    pub fn record_external_result(&mut self, result: TestResult, output: String) {
        self.set_progress(Progress::Running);
        self.stages.push(StageOutput {
            stage_name: self.runner.name().to_string(),
            result,
            output,
        });
        self.finish(result);
    }

    /// Drive the Runner (through its Controller gate) and each Differ in
    /// declared order. Sets Progress to RUNNING, then FINISHED.
    pub async fn execute(&mut self, cancel: CancellationToken) -> TestResult {
        self.set_progress(Progress::Running);
        self.start_time = Some(Instant::now());

        let differ_expectations: Vec<_> = self.differs.iter().map(|d| d.file_expectations()).collect();
        let mut checker = FileExpectationChecker::new(&self.runner.file_expectations(), &differ_expectations);

        if let Err(violation) = checker.pre_execute() {
            self.stages.push(StageOutput {
                stage_name: self.runner.name().to_string(),
                result: TestResult::Error,
                output: violation.to_string(),
            });
            return self.finish(TestResult::Error);
        }

        let (runner_result, runner_output, exit_code) = self.drive_runner(cancel.clone()).await;
        self.stages.push(StageOutput {
            stage_name: self.runner.name().to_string(),
            result: runner_result,
            output: runner_output.clone(),
        });

        // A SKIP, or anything with the exitcode bit set, stops Differ
        // execution entirely (§4.4) — there is no meaningful output to diff.
        if runner_result == TestResult::Skip || runner_result.exitcode() > 0 {
            return self.finish(runner_result);
        }

        let mut overall = runner_result;

        if let Err(violation) = checker.post_execute() {
            overall = overall.worse_of(TestResult::Error);
            self.stages.push(StageOutput {
                stage_name: "file-expectations".to_string(),
                result: TestResult::Error,
                output: violation.to_string(),
            });
        }

        let exit_code = exit_code.unwrap_or(0);
        for i in 0..self.differs.len() {
            let (d_result, d_output) = self.drive_differ(i, exit_code, &runner_output, cancel.clone()).await;
            self.stages.push(StageOutput {
                stage_name: self.differs[i].name().to_string(),
                result: d_result,
                output: d_output,
            });
            overall = overall.worse_of(d_result);
        }

        self.finish(overall)
    }

    fn finish(&mut self, result: TestResult) -> TestResult {
        self.result = Some(result);
        self.set_progress(Progress::Finished);
        result
    }

    /// Controller-gated Runner execution. Returns (classification, captured
    /// output, exit code if the Runner actually ran to completion).
    async fn drive_runner(&self, _cancel: CancellationToken) -> (TestResult, String, Option<i32>) {
        let mut controller_sink = OutputSink::new();
        {
            let mut ctx = ExecContext::new(&mut controller_sink, CancellationToken::new());
            let outcome = AssertUnwindSafe(self.controller.execute(&mut ctx)).catch_unwind().await;
            let fatal = match outcome {
                Err(panic) => Some(panic_message(panic)),
                Ok(Err(message)) => Some(message),
                Ok(Ok(())) if ctx.has_error() => Some(ctx.errors().join("; ")),
                Ok(Ok(())) => None,
            };
            if let Some(message) = fatal {
                controller_sink.writeln(&message);
                return (TestResult::Fatal, controller_sink.take(), None);
            }
        }

        if !self.controller.is_runnable() {
            return (TestResult::Skip, controller_sink.take(), None);
        }

        let mut run_sink = OutputSink::new();
        let (classification, exit_code) = {
            let mut ctx = ExecContext::new(&mut run_sink, CancellationToken::new());
            let outcome = AssertUnwindSafe(self.runner.execute(&mut ctx)).catch_unwind().await;
            match outcome {
                Err(panic) => {
                    ctx.log_error(panic_message(panic));
                    (TestResult::Exception, None)
                }
                Ok(Err(message)) => {
                    ctx.log_error(message);
                    (TestResult::Exception, None)
                }
                Ok(Ok(code)) => {
                    if ctx.has_error() {
                        (TestResult::Error, Some(code))
                    } else {
                        (TestResult::Pass, Some(code))
                    }
                }
            }
        };

        (classification, run_sink.take(), exit_code)
    }

    /// Controller-gated Differ inspection, mirroring `drive_runner`.
    async fn drive_differ(
        &self,
        index: usize,
        exit_code: i32,
        runner_output: &str,
        _cancel: CancellationToken,
    ) -> (TestResult, String) {
        let differ = &self.differs[index];

        let mut controller_sink = OutputSink::new();
        {
            let mut ctx = ExecContext::new(&mut controller_sink, CancellationToken::new());
            let outcome = AssertUnwindSafe(self.controller.execute(&mut ctx)).catch_unwind().await;
            let fatal = match outcome {
                Err(panic) => Some(panic_message(panic)),
                Ok(Err(message)) => Some(message),
                Ok(Ok(())) if ctx.has_error() => Some(ctx.errors().join("; ")),
                Ok(Ok(())) => None,
            };
            if let Some(message) = fatal {
                controller_sink.writeln(&message);
                return (TestResult::Fatal, controller_sink.take());
            }
        }

        if !self.controller.is_runnable() {
            return (TestResult::Skip, controller_sink.take());
        }

        let mut run_sink = OutputSink::new();
        let classification = {
            let mut ctx = ExecContext::new(&mut run_sink, CancellationToken::new());
            let outcome = AssertUnwindSafe(differ.inspect(exit_code, runner_output, &mut ctx)).catch_unwind().await;
            match outcome {
                Err(panic) => {
                    ctx.log_error(panic_message(panic));
                    TestResult::Exception
                }
                Ok(Err(message)) => {
                    ctx.log_error(message);
                    TestResult::Exception
                }
                Ok(Ok(())) => {
                    if ctx.has_error() {
                        TestResult::Error
                    } else {
                        TestResult::Pass
                    }
                }
            }
        };

        (classification, run_sink.take())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::paramset::Value;
    use crate::testcase::builtins::register_builtins;

    fn make_echo(factory: &Factory, name: &str, input: &str) -> Box<dyn RunnerObj> {
        let mut params = factory.params("Echo").unwrap();
        params.set_value("name", Value::Str(name.to_string())).unwrap();
        params.set("input", &format!("\"{input}\"")).unwrap();
        match factory.create("Echo", params).unwrap() {
            crate::testcase::WarehouseEntry::Runner(r) => r,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn happy_path_runs_waiting_running_finished_and_passes() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let runner = make_echo(&factory, "a", "hello");

        let mut tc = TestCase::new(runner, Vec::new());
        assert_eq!(tc.progress(), Progress::Waiting);

        let result = tc.execute(CancellationToken::new()).await;
        assert_eq!(result, TestResult::Pass);
        assert_eq!(tc.progress(), Progress::Finished);
        assert_eq!(tc.stages()[0].output, "hello\n");

        assert_eq!(tc.close(), Some(TestResult::Pass));
        assert_eq!(tc.progress(), Progress::Closed);
    }

    #[test]
    #[should_panic(expected = "forward")]
    fn progress_cannot_move_backwards() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let runner = make_echo(&factory, "a", "hello");
        let mut tc = TestCase::new(runner, Vec::new());
        tc.set_progress(Progress::Running);
        tc.set_progress(Progress::Waiting);
    }
}
