//! The Scheduler's wrapper around a TestCase (§3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::testcase::TestCase;

/// A TestCase plus scheduling metadata: prerequisites, slot demand, a skip
/// flag, human-readable caveats, and scheduler-private metadata (e.g.
/// QueueManager submission artifacts).
pub struct Job {
    pub name: String,
    pub prereqs: Vec<String>,
    pub slots: u32,
    pub skip: bool,
    pub caveats: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub timeout: Duration,
    /// The directory of the configuration file that declared this Job;
    /// QueueManager groups Jobs that share this directory (§4.5).
    pub source_dir: PathBuf,
    pub test_case: TestCase,
}

impl Job {
    pub fn new(test_case: TestCase, prereqs: Vec<String>, slots: u32, timeout: Duration, source_dir: PathBuf) -> Self {
        Self {
            name: test_case.name().to_string(),
            prereqs,
            slots,
            skip: false,
            caveats: Vec::new(),
            metadata: HashMap::new(),
            timeout,
            source_dir,
            test_case,
        }
    }

    pub fn add_caveat(&mut self, caveat: impl Into<String>) {
        self.caveats.push(caveat.into());
    }

    pub fn mark_skip(&mut self, caveat: impl Into<String>) {
        self.skip = true;
        self.add_caveat(caveat);
    }
}
