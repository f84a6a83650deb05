//! The dispatcher: a dependency-ordered, slot-budgeted worker pool.
//!
//! Grounded on `orchestrator.rs`'s use of `tokio_scoped::scope` to spawn
//! non-`'static` batches of work and wait for them inline, and on
//! `original_source/moosetools/testharness/base/TestHarness.py`'s wave-by-wave
//! dependency dispatch (`__getNextTest` walking the DAG by prereq).

use std::collections::HashMap;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::report::Reporter;
use crate::testcase::TestResult;

use super::graph;
use super::job::Job;

/// One Job's outcome after the run, independent of live state.
pub struct JobOutcome {
    pub name: String,
    pub result: TestResult,
    pub caveats: Vec<String>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self
            .outcomes
            .iter()
            .any(|o| !matches!(o.result, TestResult::Pass | TestResult::Skip))
        {
            1
        } else {
            0
        }
    }

    pub fn counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for o in &self.outcomes {
            *counts.entry(o.result.display()).or_insert(0) += 1;
        }
        counts
    }
}

/// Dispatches a flattened set of [`Job`]s honoring prereqs and a fixed slot
/// budget. One wave at a time: a wave is every Job whose prereqs are
/// satisfied and not yet dispatched, bin-packed into slot-budget-respecting
/// batches that run concurrently.
pub struct Scheduler {
    slot_budget: u32,
}

impl Scheduler {
    pub fn new(slot_budget: u32) -> Self {
        Self {
            slot_budget: slot_budget.max(1),
        }
    }

    pub async fn run(
        &self,
        jobs: Vec<Job>,
        cancel: CancellationToken,
        reporter: &dyn Reporter,
    ) -> Result<RunSummary, SchedulerError> {
        graph::check(&jobs)?;

        let n = jobs.len();
        let name_index: HashMap<String, usize> = jobs.iter().enumerate().map(|(i, j)| (j.name.clone(), i)).collect();
        let mut finished = vec![false; n];
        let mut skip = vec![false; n];
        let mut results: Vec<Option<TestResult>> = vec![None; n];
        let mut finished_at: Vec<Option<chrono::DateTime<chrono::Utc>>> = vec![None; n];
        let mut extra_caveats: Vec<Vec<String>> = jobs.iter().map(|j| j.caveats.clone()).collect();

        for (i, job) in jobs.iter().enumerate() {
            if job.skip {
                skip[i] = true;
            }
        }

        let jobs: Vec<AsyncMutex<Job>> = jobs.into_iter().map(AsyncMutex::new).collect();

        let mut remaining = n;
        while remaining > 0 {
            let ready: Vec<usize> = {
                let mut ready = Vec::new();
                for i in 0..n {
                    if finished[i] {
                        continue;
                    }
                    let job = jobs[i].lock().await;
                    let satisfied = job.prereqs.iter().all(|p| finished[name_index[p]]);
                    drop(job);
                    if satisfied {
                        ready.push(i);
                    }
                }
                ready
            };

            if ready.is_empty() {
                warn!("scheduler dispatch stalled with {remaining} job(s) remaining and none ready");
                break;
            }

            let (to_skip, to_run): (Vec<usize>, Vec<usize>) = ready.into_iter().partition(|&i| skip[i]);

            for i in to_skip {
                results[i] = Some(TestResult::Skip);
                finished_at[i] = Some(chrono::Utc::now());
                finished[i] = true;
                remaining -= 1;
                propagate_skip(i, &jobs, &name_index, &mut skip, &mut extra_caveats).await;
            }

            for batch in pack(&to_run, &jobs, self.slot_budget).await {
                let outcomes = run_batch(&jobs, &batch, cancel.clone(), reporter).await;
                for (i, result) in outcomes {
                    if result != TestResult::Pass {
                        propagate_skip(i, &jobs, &name_index, &mut skip, &mut extra_caveats).await;
                    }
                    results[i] = Some(result);
                    finished_at[i] = Some(chrono::Utc::now());
                    finished[i] = true;
                    remaining -= 1;
                }
            }
        }

        let mut outcomes = Vec::with_capacity(n);
        for i in 0..n {
            let job = jobs[i].lock().await;
            let name = job.name.clone();
            drop(job);
            let outcome = JobOutcome {
                name,
                result: results[i].unwrap_or(TestResult::Skip),
                caveats: extra_caveats[i].clone(),
                finished_at: finished_at[i].unwrap_or_else(chrono::Utc::now),
            };
            if skip[i] {
                reporter.on_job_complete(&outcome).await;
            }
            outcomes.push(outcome);
        }
        Ok(RunSummary { outcomes })
    }
}

/// Mark every Job whose prereqs include `name[failed]` as skipped, with a
/// caveat, per §4.5 ("skipped (prereq failed)").
async fn propagate_skip(
    failed: usize,
    jobs: &[AsyncMutex<Job>],
    name_index: &HashMap<String, usize>,
    skip: &mut [bool],
    extra_caveats: &mut [Vec<String>],
) {
    let failed_name = jobs[failed].lock().await.name.clone();
    for (i, job) in jobs.iter().enumerate() {
        let job = job.lock().await;
        if job.prereqs.iter().any(|p| name_index.get(p) == Some(&failed)) && !skip[i] {
            skip[i] = true;
            extra_caveats[i].push(format!("skipped (prereq '{failed_name}' did not pass)"));
        }
    }
}

/// Greedy bin-packing of `ready` job indices into batches whose summed slot
/// demand does not exceed `budget`. A single Job whose own demand exceeds
/// the budget still runs, alone, in its own batch.
async fn pack(ready: &[usize], jobs: &[AsyncMutex<Job>], budget: u32) -> Vec<Vec<usize>> {
    let mut demands: Vec<(usize, u32)> = Vec::with_capacity(ready.len());
    for &i in ready {
        demands.push((i, jobs[i].lock().await.slots));
    }
    demands.sort_by(|a, b| b.1.cmp(&a.1));

    let mut batches: Vec<(Vec<usize>, u32)> = Vec::new();
    for (i, slots) in demands {
        if let Some(batch) = batches.iter_mut().find(|(_, used)| *used + slots <= budget) {
            batch.0.push(i);
            batch.1 += slots;
        } else {
            batches.push((vec![i], slots));
        }
    }
    batches.into_iter().map(|(indices, _)| indices).collect()
}

/// Run one batch of Jobs concurrently, enforcing each Job's own timeout.
async fn run_batch(
    jobs: &[AsyncMutex<Job>],
    batch: &[usize],
    cancel: CancellationToken,
    reporter: &dyn Reporter,
) -> Vec<(usize, TestResult)> {
    let outcomes: std::sync::Mutex<Vec<(usize, TestResult)>> = std::sync::Mutex::new(Vec::new());

    tokio_scoped::scope(|scope| {
        for &i in batch {
            let outcomes = &outcomes;
            let jobs = &jobs;
            let cancel = cancel.clone();
            scope.spawn(async move {
                let mut job = jobs[i].lock().await;
                let name = job.name.clone();
                info!("{name}...RUNNING");
                let child = cancel.child_token();
                let progress_interval = job.test_case.progress_interval();
                let started = std::time::Instant::now();
                let timeout = job.timeout;

                let mut ticker = tokio::time::interval(progress_interval);
                ticker.tick().await; // the first tick fires immediately

                let mut timed_out = false;
                let result = {
                    let exec_fut = tokio::time::timeout(timeout, job.test_case.execute(child.clone()));
                    tokio::pin!(exec_fut);

                    loop {
                        tokio::select! {
                            outcome = &mut exec_fut => {
                                break match outcome {
                                    Ok(result) => result,
                                    Err(_) => {
                                        child.cancel();
                                        timed_out = true;
                                        TestResult::Error
                                    }
                                };
                            }
                            _ = ticker.tick() => {
                                let line = format!("{name}...RUNNING [{:.1}s]", started.elapsed().as_secs_f64());
                                info!("{line}");
                                reporter.on_progress(&line).await;
                            }
                        }
                    }
                };
                if timed_out {
                    job.add_caveat("TIMEOUT");
                }
                job.close();
                reporter
                    .on_job_complete(&JobOutcome {
                        name: name.clone(),
                        result,
                        caveats: job.caveats.clone(),
                        finished_at: chrono::Utc::now(),
                    })
                    .await;
                outcomes.lock().unwrap().push((i, result));
            });
        }
    });

    outcomes.into_inner().unwrap()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::factory::Factory;
    use crate::paramset::Value;
    use crate::report::NullReporter;
    use crate::testcase::builtins::register_builtins;
    use crate::testcase::{ExecContext, RunnerExecuteResult, RunnerObj, TestCase};

    struct SleepyRunner {
        name: String,
        millis: u64,
        fail: bool,
    }

    #[async_trait]
    impl RunnerObj for SleepyRunner {
        fn name(&self) -> &str {
            &self.name
        }
        async fn execute(&self, ctx: &mut ExecContext<'_>) -> RunnerExecuteResult {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            if self.fail {
                ctx.log_error("deliberate failure");
            }
            Ok(0)
        }
    }

    fn sleepy_job(name: &str, millis: u64, fail: bool, slots: u32, prereqs: Vec<String>) -> Job {
        let runner = Box::new(SleepyRunner {
            name: name.to_string(),
            millis,
            fail,
        });
        let tc = TestCase::new(runner, Vec::new());
        Job::new(tc, prereqs, slots, Duration::from_secs(5), PathBuf::from("."))
    }

    #[tokio::test]
    async fn prereq_failure_skips_downstream() {
        let jobs = vec![
            sleepy_job("a", 1, true, 1, vec![]),
            sleepy_job("b", 1, false, 1, vec!["a".to_string()]),
        ];
        let scheduler = Scheduler::new(4);
        let summary = scheduler.run(jobs, CancellationToken::new(), &NullReporter).await.unwrap();
        let b = summary.outcomes.iter().find(|o| o.name == "b").unwrap();
        assert_eq!(b.result, TestResult::Skip);
        assert!(b.caveats.iter().any(|c| c.contains("prereq")));
    }

    #[tokio::test]
    async fn respects_slot_budget_by_serializing_excess_demand() {
        let jobs = vec![
            sleepy_job("a", 5, false, 2, vec![]),
            sleepy_job("b", 5, false, 2, vec![]),
            sleepy_job("c", 5, false, 2, vec![]),
        ];
        let scheduler = Scheduler::new(2);
        let summary = scheduler.run(jobs, CancellationToken::new(), &NullReporter).await.unwrap();
        assert_eq!(summary.outcomes.len(), 3);
        assert!(summary.outcomes.iter().all(|o| o.result == TestResult::Pass));
    }

    #[tokio::test]
    async fn cycle_detected_before_dispatch() {
        let jobs = vec![
            sleepy_job("a", 1, false, 1, vec!["b".to_string()]),
            sleepy_job("b", 1, false, 1, vec!["a".to_string()]),
        ];
        let scheduler = Scheduler::new(4);
        assert!(scheduler.run(jobs, CancellationToken::new(), &NullReporter).await.is_err());
    }

    #[tokio::test]
    async fn dispatch_order_is_independent_of_input_job_order() {
        use rand::seq::SliceRandom;

        let mut jobs = vec![
            sleepy_job("a", 1, false, 1, vec![]),
            sleepy_job("b", 1, false, 1, vec!["a".to_string()]),
            sleepy_job("c", 1, false, 1, vec!["b".to_string()]),
            sleepy_job("d", 1, false, 1, vec![]),
        ];
        jobs.shuffle(&mut rand::thread_rng());

        let scheduler = Scheduler::new(4);
        let summary = scheduler.run(jobs, CancellationToken::new(), &NullReporter).await.unwrap();
        assert_eq!(summary.outcomes.len(), 4);
        assert!(summary.outcomes.iter().all(|o| o.result == TestResult::Pass));
    }

    #[test]
    fn factory_still_registers_builtins_for_other_tests() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let mut params = factory.params("Echo").unwrap();
        params.set_value("name", Value::Str("z".into())).unwrap();
        params.set("input", "x").unwrap();
        assert!(factory.create("Echo", params).is_ok());
    }
}
