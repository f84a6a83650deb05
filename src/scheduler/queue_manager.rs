//! Third-party queue submission, reaping, and cleanup (§4.5's QueueManager
//! plugin point). Grounded on
//! `original_source/moosetest/schedulers/QueueManager.py`: a group of Jobs
//! that share a source directory is collapsed to a single "executor" Job
//! that is actually dispatched (e.g. submitted to PBS); the rest are
//! finished immediately. A later pass reaps a JSON results file the
//! executor's own run produced and assigns every sibling Job's Result from
//! it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::testcase::TestResult;

use super::job::Job;

/// One entry of a reaped queue results file, keyed `job_dir -> plugin ->
/// test_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueResultEntry {
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "COLOR")]
    pub color: String,
    #[serde(rename = "TIMING")]
    pub timing: f64,
    #[serde(rename = "CAVEATS")]
    pub caveats: Vec<String>,
    #[serde(rename = "OUTPUT")]
    pub output: String,
}

pub type GroupResults = HashMap<String, QueueResultEntry>;
pub type QueueResults = HashMap<String, HashMap<String, GroupResults>>;

/// Parse a persisted queue results file (§6's layout: `job_dir -> plugin ->
/// test_name -> {STATUS, COLOR, TIMING, CAVEATS, OUTPUT}`) for [`QueueManager::reap`].
pub fn load_results(path: &Path) -> anyhow::Result<QueueResults> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(anyhow::Error::from)
}

/// A group of Jobs sharing one `source_dir`, about to be (or already)
/// submitted as a single unit.
pub struct JobGroup<'a> {
    pub job_dir: PathBuf,
    pub jobs: &'a mut [Job],
}

/// Outcome of attempting to reap a group's results.
pub enum ReapOutcome {
    /// No results recorded for this job_dir yet; jobs are marked QUEUED.
    NotReady,
    /// A results file exists for this job_dir, but it is empty for this
    /// group — silently finish everything (§4.5, "silently skipped during
    /// initial launch").
    SilentFinish,
    /// A results file exists for this job_dir but under a different
    /// plugin name than the one currently configured; also a silent
    /// finish.
    DifferentPlugin,
    /// Results were applied to each Job in the group.
    Applied,
}

pub struct QueueManager {
    plugin_name: String,
}

impl QueueManager {
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
        }
    }

    /// Elect one Job per group as the "executor": the only one the normal
    /// Scheduler dispatch actually touches. Every other not-yet-finished Job
    /// in the group is immediately finished with a QUEUED caveat and no
    /// Result, mirroring `_prepareJobs`'s `launchable_jobs` filter — a Job
    /// already finished or skipped (e.g. a prerequisite failure) is left
    /// alone rather than being promoted to executor or stamped LAUNCHING.
    pub fn prepare_submission(&self, group: &mut JobGroup<'_>) -> Option<SubmissionPlan> {
        if group.jobs.is_empty() {
            return None;
        }
        let ncpus = max_slots(group.jobs);
        let max_time = total_walltime(group.jobs);

        let executor_idx = group.jobs.iter().position(is_launchable)?;

        for (i, job) in group.jobs.iter_mut().enumerate() {
            if i != executor_idx && is_launchable(job) {
                job.add_caveat("LAUNCHING");
            }
        }

        let executor = &mut group.jobs[executor_idx];
        executor.metadata.insert("QUEUEING".to_string(), self.plugin_name.clone());
        executor.metadata.insert("QUEUEING_NCPUS".to_string(), ncpus.to_string());
        executor
            .metadata
            .insert("QUEUEING_MAXTIME".to_string(), max_time.as_secs().to_string());

        Some(SubmissionPlan {
            ncpus,
            max_time,
            job_dir: group.job_dir.clone(),
        })
    }

    /// Render a submission-script template: replace every `<KEY>`
    /// placeholder (uppercased) with its value, then strip any placeholder
    /// left over for a key that was not supplied. Grounded on
    /// `createQueueScript`'s replace/strip loop.
    pub fn render_script(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut content = template.to_string();
        for (key, value) in vars {
            let placeholder = format!("<{}>", key.to_uppercase());
            if content.contains(&placeholder) {
                content = content.replace(&placeholder, value);
            }
        }
        let leftover = regex::Regex::new(r"<[A-Z0-9_]+>").unwrap();
        leftover.replace_all(&content, "").into_owned()
    }

    /// Attempt to reap results for one group. `results` is the parsed
    /// contents of the shared JSON results file; `job_dir` is this group's
    /// key into it.
    pub fn reap(&self, job_dir: &str, results: &QueueResults, group: &mut JobGroup<'_>) -> ReapOutcome {
        let Some(by_plugin) = results.get(job_dir) else {
            for job in group.jobs.iter_mut() {
                job.add_caveat("QUEUED");
            }
            return ReapOutcome::NotReady;
        };

        if by_plugin.is_empty() {
            for job in group.jobs.iter_mut() {
                job.test_case.record_external_result(TestResult::Skip, String::new());
            }
            return ReapOutcome::SilentFinish;
        }

        let Some(group_results) = by_plugin.get(&self.plugin_name) else {
            for job in group.jobs.iter_mut() {
                job.test_case.record_external_result(TestResult::Skip, String::new());
            }
            return ReapOutcome::DifferentPlugin;
        };

        for job in group.jobs.iter_mut() {
            match group_results.get(&job.name) {
                Some(entry) => {
                    let result = TestResult::from_display(&entry.status).unwrap_or(TestResult::Error);
                    for caveat in &entry.caveats {
                        job.add_caveat(caveat.clone());
                    }
                    job.test_case.record_external_result(result, entry.output.clone());
                }
                None => {
                    job.add_caveat("not originally launched");
                    job.test_case.record_external_result(TestResult::Skip, String::new());
                }
            }
        }
        ReapOutcome::Applied
    }

    /// Delete artifacts a prior submission recorded in a Job's metadata
    /// under `QUEUE_FILES` (a comma-separated path list), refusing to
    /// delete anything outside the Job's own `source_dir` — the one safety
    /// check `_cleanupFiles` performs.
    pub fn cleanup(&self, group: &JobGroup<'_>) -> std::io::Result<()> {
        for job in group.jobs.iter() {
            let Some(files) = job.metadata.get("QUEUE_FILES") else {
                continue;
            };
            for file in files.split(',').filter(|s| !s.is_empty()) {
                let path = Path::new(file);
                if path.parent() != Some(group.job_dir.as_path()) {
                    continue;
                }
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

pub struct SubmissionPlan {
    pub job_dir: PathBuf,
    pub ncpus: u32,
    pub max_time: Duration,
}

/// A Job not yet skipped and not yet carrying a Result is a candidate for
/// executor election or a LAUNCHING stamp, per `_prepareJobs`'s
/// `launchable_jobs` filter.
fn is_launchable(job: &Job) -> bool {
    !job.skip && job.test_case.result().is_none()
}

fn max_slots(jobs: &[Job]) -> u32 {
    jobs.iter().filter(|j| !j.skip).map(|j| j.slots).max().unwrap_or(1)
}

fn total_walltime(jobs: &[Job]) -> Duration {
    jobs.iter().filter(|j| !j.skip).map(|j| j.timeout).sum()
}

/// Group a flat Job list by `source_dir`, preserving first-seen order.
pub fn group_by_source_dir(jobs: &mut [Job]) -> Vec<JobGroup<'_>> {
    let mut order: Vec<PathBuf> = Vec::new();
    for job in jobs.iter() {
        if !order.contains(&job.source_dir) {
            order.push(job.source_dir.clone());
        }
    }

    let mut groups: Vec<JobGroup<'_>> = Vec::new();
    let mut remaining: &mut [Job] = jobs;
    for dir in order {
        let split = remaining.iter().take_while(|j| j.source_dir == dir).count();
        // This simple grouping assumes Jobs sharing a directory are
        // contiguous; callers should sort by `source_dir` first if not.
        let (head, tail) = remaining.split_at_mut(split);
        remaining = tail;
        groups.push(JobGroup { job_dir: dir, jobs: head });
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::testcase::TestCase;

    fn job(name: &str, dir: &str) -> Job {
        use crate::factory::Factory;
        use crate::paramset::Value;
        use crate::testcase::builtins::register_builtins;

        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let mut params = factory.params("Echo").unwrap();
        params.set_value("name", Value::Str(name.to_string())).unwrap();
        params.set("input", "x").unwrap();
        let runner = match factory.create("Echo", params).unwrap() {
            crate::testcase::WarehouseEntry::Runner(r) => r,
            _ => unreachable!(),
        };
        let tc = TestCase::new(runner, Vec::new());
        Job::new(tc, vec![], 1, StdDuration::from_secs(60), PathBuf::from(dir))
    }

    #[test]
    fn groups_jobs_by_source_dir() {
        let mut jobs = vec![job("a", "/tests/x"), job("b", "/tests/x"), job("c", "/tests/y")];
        let groups = group_by_source_dir(&mut jobs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].jobs.len(), 2);
        assert_eq!(groups[1].jobs.len(), 1);
    }

    #[test]
    fn render_script_replaces_and_strips_placeholders() {
        let qm = QueueManager::new("TestPlugin");
        let mut vars = HashMap::new();
        vars.insert("ncpus".to_string(), "4".to_string());
        let rendered = qm.render_script("#PBS -l nodes=1:ppn=<NCPUS>\n<MAXTIME>", &vars);
        assert_eq!(rendered, "#PBS -l nodes=1:ppn=4\n");
    }

    #[test]
    fn prepare_submission_skips_already_finished_job_when_electing_executor() {
        let qm = QueueManager::new("TestPlugin");
        let mut jobs = vec![job("a", "/tests/x"), job("b", "/tests/x")];
        jobs[0].mark_skip("prereq failed");
        let mut group = JobGroup {
            job_dir: PathBuf::from("/tests/x"),
            jobs: &mut jobs,
        };

        qm.prepare_submission(&mut group).unwrap();

        assert!(!group.jobs[0].metadata.contains_key("QUEUEING"));
        assert!(!group.jobs[0].caveats.iter().any(|c| c == "LAUNCHING"));
        assert!(group.jobs[1].metadata.contains_key("QUEUEING"));
    }

    #[test]
    fn reap_marks_not_originally_launched_tests_as_skip() {
        let qm = QueueManager::new("TestPlugin");
        let mut jobs = vec![job("a", "/tests/x")];
        let mut group = JobGroup {
            job_dir: PathBuf::from("/tests/x"),
            jobs: &mut jobs,
        };
        let mut results: QueueResults = HashMap::new();
        let mut by_plugin = HashMap::new();
        by_plugin.insert("TestPlugin".to_string(), HashMap::new());
        results.insert("/tests/x".to_string(), by_plugin);

        let outcome = qm.reap("/tests/x", &results, &mut group);
        assert!(matches!(outcome, ReapOutcome::Applied));
        assert_eq!(group.jobs[0].test_case.result(), Some(TestResult::Skip));
        assert!(group.jobs[0].caveats.iter().any(|c| c == "not originally launched"));
    }

    #[test]
    fn load_results_parses_persisted_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(
            &path,
            r#"{
                "/tests/x": {
                    "TestPlugin": {
                        "a": {
                            "STATUS": "OK",
                            "COLOR": "green",
                            "TIMING": 1.5,
                            "CAVEATS": [],
                            "OUTPUT": "hello\n"
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let results = load_results(&path).unwrap();
        let entry = &results["/tests/x"]["TestPlugin"]["a"];
        assert_eq!(entry.status, "OK");
        assert_eq!(entry.timing, 1.5);
    }
}
