//! `harnessrs` CLI - thin driver around the library crate.
//!
//! Three subcommands exercise the core: `run` parses a test-declaration
//! file and dispatches it through the Scheduler, `validate` parses the
//! same file and reports diagnostics without running anything, and
//! `queue-cleanup` removes artifacts a prior QueueManager submission left
//! behind. No production command surface is implied beyond this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harnessrs::config::{self, Config};
use harnessrs::factory::Factory;
use harnessrs::parser;
use harnessrs::report::{ConsoleReporter, MultiReporter, Reporter};
use harnessrs::scheduler::{self, Job, Scheduler};
use harnessrs::testcase::builtins::register_builtins;
use harnessrs::testcase::{TestCase, WarehouseEntry};
use harnessrs::warehouse::Warehouse;

#[derive(ClapParser)]
#[command(name = "harnessrs")]
#[command(about = "Dependency-aware parallel test harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Harness settings file (slot budget, timeouts, logging).
    #[arg(short, long, default_value = "harness.toml")]
    settings: PathBuf,

    /// Verbose console output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a test-declaration file and dispatch it.
    Run {
        /// Path to a `[name] ... []` test-declaration file.
        tests: PathBuf,
    },

    /// Parse a test-declaration file and report diagnostics only.
    Validate {
        /// Path to a `[name] ... []` test-declaration file.
        tests: PathBuf,
    },

    /// Delete QueueManager artifacts recorded under `QUEUE_FILES` metadata
    /// for every job group declared in a test-declaration file.
    QueueCleanup {
        /// Path to a `[name] ... []` test-declaration file.
        tests: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = if cli.settings.exists() {
        config::load_config(&cli.settings).with_context(|| format!("failed to load settings from {}", cli.settings.display()))?
    } else {
        Config::default()
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&settings.harness.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run { tests } => run_tests(&tests, &settings, cli.verbose).await,
        Commands::Validate { tests } => validate(&tests),
        Commands::QueueCleanup { tests } => queue_cleanup(&tests),
    }
}

fn factory_with_builtins() -> Factory {
    let mut factory = Factory::new();
    register_builtins(&mut factory);
    factory
}

async fn run_tests(tests_path: &Path, settings: &Config, verbose: bool) -> Result<()> {
    let factory = factory_with_builtins();
    let mut warehouse = Warehouse::new();
    let outcome = parser::parse_file(tests_path, &factory, &mut warehouse)
        .with_context(|| format!("failed to read {}", tests_path.display()))?;

    for diagnostic in &outcome.diagnostics {
        warn!("{diagnostic}");
    }
    if outcome.has_errors() {
        anyhow::bail!("{} failed to parse cleanly; not running", tests_path.display());
    }

    let source_dir = tests_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let jobs = build_jobs(&mut warehouse, &source_dir, settings);
    info!("dispatching {} job(s) from {}", jobs.len(), tests_path.display());

    let reporter = MultiReporter::new().with_reporter(ConsoleReporter::new(verbose));
    reporter.on_run_start(jobs.len()).await;

    let scheduler = Scheduler::new(settings.harness.slot_budget);
    let cancel = CancellationToken::new();
    let summary = scheduler.run(jobs, cancel, &reporter).await?;

    reporter.on_run_complete(&summary).await;

    std::process::exit(summary.exit_code());
}

fn validate(tests_path: &Path) -> Result<()> {
    let factory = factory_with_builtins();
    let mut warehouse = Warehouse::new();
    let outcome = parser::parse_file(tests_path, &factory, &mut warehouse)
        .with_context(|| format!("failed to read {}", tests_path.display()))?;

    for diagnostic in &outcome.diagnostics {
        println!("{diagnostic}");
    }
    println!("{} object(s) constructed, {} diagnostic(s)", outcome.objects_created, outcome.diagnostics.len());

    if outcome.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn queue_cleanup(tests_path: &Path) -> Result<()> {
    let factory = factory_with_builtins();
    let mut warehouse = Warehouse::new();
    let outcome = parser::parse_file(tests_path, &factory, &mut warehouse)
        .with_context(|| format!("failed to read {}", tests_path.display()))?;
    if outcome.has_errors() {
        anyhow::bail!("{} failed to parse cleanly; not cleaning up", tests_path.display());
    }

    let source_dir = tests_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let mut jobs = build_jobs(&mut warehouse, &source_dir, &Config::default());

    let manager = scheduler::QueueManager::new("harnessrs");
    for group in scheduler::group_by_source_dir(&mut jobs) {
        manager.cleanup(&group).with_context(|| format!("cleanup failed for {}", group.job_dir.display()))?;
    }
    Ok(())
}

/// Wrap every Runner in the Warehouse (plus the Differs it names) into a
/// [`Job`], using the slot/timeout/prereq values the Runner itself
/// declares (§3), with its TestCase's progress-reporting interval taken
/// from the harness settings.
fn build_jobs(warehouse: &mut Warehouse, source_dir: &Path, settings: &Config) -> Vec<Job> {
    let mut objects: HashMap<String, WarehouseEntry> =
        warehouse.drain().into_iter().map(|o| (o.name().to_string(), o)).collect();

    let runner_names: Vec<String> = objects
        .iter()
        .filter(|(_, o)| matches!(o, WarehouseEntry::Runner(_)))
        .map(|(name, _)| name.clone())
        .collect();

    let mut jobs = Vec::with_capacity(runner_names.len());
    for name in runner_names {
        let Some(WarehouseEntry::Runner(runner)) = objects.remove(&name) else {
            continue;
        };
        let prereqs = runner.prereqs().to_vec();
        let slots = runner.slots();
        let timeout = runner.timeout();

        let mut differs = Vec::new();
        for differ_name in runner.differs() {
            match objects.remove(differ_name) {
                Some(WarehouseEntry::Differ(d)) => differs.push(d),
                Some(other) => {
                    warn!("'{differ_name}' referenced as a differ by '{name}' is not a Differ");
                    objects.insert(differ_name.clone(), other);
                }
                None => warn!("differ '{differ_name}' referenced by '{name}' was not found"),
            }
        }

        let test_case = TestCase::new(runner, differs)
            .with_progress_interval(std::time::Duration::from_secs(settings.harness.progress_interval_secs));
        jobs.push(Job::new(test_case, prereqs, slots, timeout, source_dir.to_path_buf()));
    }
    jobs
}
