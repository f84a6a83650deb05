//! Configuration schema for the harness's own settings (distinct from the
//! bespoke `[name] ... []` block format used for test declarations).
//!
//! Grounded on the teacher's `config/schema.rs`: the same shape (one root
//! `Config` struct, per-concern sub-structs, `#[serde(default)]` with
//! `default_*()` helper functions), reduced to the settings this harness
//! actually needs (§1.1/§6's ambient-stack config section).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for the harness.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Scheduling settings plus logging verbosity, under `[harness]` per §6.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Reporting settings (output directory for generated artifacts).
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            harness: HarnessConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Total concurrent slot budget across all dispatched Jobs.
    #[serde(default = "default_slot_budget")]
    pub slot_budget: u32,

    /// Per-Job timeout applied when a Runner doesn't declare its own.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// How often a RUNNING TestCase reports a progress line (§4.4).
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    /// Logging verbosity, forwarded to `tracing_subscriber`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            slot_budget: default_slot_budget(),
            default_timeout_secs: default_timeout_secs(),
            progress_interval_secs: default_progress_interval_secs(),
            log_level: default_log_level(),
        }
    }
}

fn default_slot_budget() -> u32 {
    4
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_progress_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Directory generated artifacts (queue results, logs) are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("test-results")
}
