//! Minimal Runner/Differ implementations used as test scaffolding.
//!
//! Per Design Notes, these two types are not production Runner/Differ
//! implementations (file existence checks, CSV comparison, command
//! execution are explicitly out of scope) — they exist only so the engine
//! has something concrete to drive in tests and in the example
//! configuration shipped with the `run` CLI subcommand.

use async_trait::async_trait;

use crate::factory::Factory;
use crate::paramset::{ParamOptions, ParamSet, Value, ValueKind};

use super::differ::{DifferInspectResult, DifferObj};
use super::file_expectations::FileExpectations;
use super::runner::{RunnerExecuteResult, RunnerObj};
use super::sink::ExecContext;
use super::WarehouseEntry;

fn file_group_schema() -> ParamSet {
    let mut file = ParamSet::new();
    file.add(
        "base",
        ValueKind::Str,
        ParamOptions::new()
            .verify(
                |v| v.as_str().map(|s| std::path::Path::new(s).is_absolute()).unwrap_or(false),
                "The supplied directory must be an absolute path.",
            )
            .doc("Base directory for relative file names."),
    );
    file.add(
        "names",
        ValueKind::Array,
        ParamOptions::new().doc("File name(s) expected to be created."),
    );
    file.add(
        "check_created",
        ValueKind::Bool,
        ParamOptions::new().immutable().doc("Check no unexpected files appear under 'base'."),
    );
    file.add(
        "clean",
        ValueKind::Bool,
        ParamOptions::new()
            .default_value(Value::Bool(true))
            .doc("Delete pre-existing expected files before execution."),
    );
    file.add(
        "ignore",
        ValueKind::Array,
        ParamOptions::new().doc("Glob patterns (*, ?) excluded from the unexpected-file report."),
    );
    file
}

fn common_schema(params: &mut ParamSet) {
    params.add("name", ValueKind::Str, ParamOptions::new().required().doc("Object name."));
    params.add(
        "file",
        ValueKind::Params,
        ParamOptions::new()
            .default_value(Value::Params(file_group_schema()))
            .doc("File-expectation parameters."),
    );
}

fn read_file_expectations(params: &ParamSet) -> FileExpectations {
    let file = params.get("file").and_then(Value::as_params);
    FileExpectations {
        base: file
            .and_then(|f| f.get_str("base"))
            .map(std::path::PathBuf::from),
        names: file
            .and_then(|f| f.get_array("names"))
            .map(|a| a.to_vec())
            .unwrap_or_default(),
        check_created: file.and_then(|f| f.get_bool("check_created")),
        clean: file.and_then(|f| f.get_bool("clean")).unwrap_or(true),
        ignore_patterns: file.and_then(|f| f.get_array("ignore")).map(|a| a.to_vec()).unwrap_or_default(),
    }
}

/// Writes its `input` parameter to captured stdout and exits 0. Grounds
/// Scenario 1 ("happy path") from Testable Properties §8.
pub struct EchoRunner {
    name: String,
    input: String,
    prereqs: Vec<String>,
    differs: Vec<String>,
    file: FileExpectations,
}

#[async_trait]
impl RunnerObj for EchoRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn differs(&self) -> &[String] {
        &self.differs
    }

    fn prereqs(&self) -> &[String] {
        &self.prereqs
    }

    fn file_expectations(&self) -> FileExpectations {
        self.file.clone()
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>) -> RunnerExecuteResult {
        ctx.sink.writeln(&self.input);
        Ok(0)
    }
}

fn echo_schema() -> ParamSet {
    let mut params = ParamSet::new();
    common_schema(&mut params);
    params.add(
        "input",
        ValueKind::Str,
        ParamOptions::new().default_value(Value::Str(String::new())).doc("Text to echo to stdout."),
    );
    params.add(
        "prereq",
        ValueKind::Array,
        ParamOptions::new().doc("Names of Runners that must finish first."),
    );
    params.add(
        "differs",
        ValueKind::Array,
        ParamOptions::new().doc("Names of Differ objects to run after this Runner."),
    );
    params
}

fn echo_constructor(params: ParamSet) -> Result<WarehouseEntry, String> {
    let name = params.get_str("name").ok_or("missing name")?.to_string();
    let input = params.get_str("input").unwrap_or_default().to_string();
    let prereqs = params.get_array("prereq").map(|a| a.to_vec()).unwrap_or_default();
    let differs = params.get_array("differs").map(|a| a.to_vec()).unwrap_or_default();
    let file = read_file_expectations(&params);
    Ok(WarehouseEntry::Runner(Box::new(EchoRunner {
        name,
        input,
        prereqs,
        differs,
        file,
    })))
}

/// Fails if any configured `names` do not exist on disk after the Runner
/// has executed.
pub struct FileExistsDiffer {
    name: String,
    file: FileExpectations,
}

#[async_trait]
impl DifferObj for FileExistsDiffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_expectations(&self) -> FileExpectations {
        self.file.clone()
    }

    async fn inspect(&self, _exit_code: i32, _runner_output: &str, ctx: &mut ExecContext<'_>) -> DifferInspectResult {
        let missing: Vec<String> = self
            .file
            .resolved_names()
            .into_iter()
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            ctx.log_error(format!("expected file(s) missing: {}", missing.join(", ")));
        }
        Ok(())
    }
}

fn file_exists_schema() -> ParamSet {
    let mut params = ParamSet::new();
    common_schema(&mut params);
    params
}

fn file_exists_constructor(params: ParamSet) -> Result<WarehouseEntry, String> {
    let name = params.get_str("name").ok_or("missing name")?.to_string();
    let file = read_file_expectations(&params);
    Ok(WarehouseEntry::Differ(Box::new(FileExistsDiffer { name, file })))
}

/// Registers the test-scaffolding types. Called once at startup, the same
/// way any plugin registers itself as a side effect of being linked in.
pub fn register_builtins(factory: &mut Factory) {
    factory.register("Echo", echo_schema, echo_constructor);
    factory.register("FileExists", file_exists_schema, file_exists_constructor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn echo_writes_input_to_sink() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let mut params = factory.params("Echo").unwrap();
        params.set_value("name", Value::Str("a".into())).unwrap();
        params.set("input", "\"hello\"").unwrap();
        let entry = factory.create("Echo", params).unwrap();
        let runner = entry.as_runner().unwrap();

        let mut sink = super::super::sink::OutputSink::new();
        let code = {
            let mut ctx = ExecContext::new(&mut sink, CancellationToken::new());
            runner.execute(&mut ctx).await.unwrap()
        };
        assert_eq!(code, 0);
        assert_eq!(sink.take(), "hello\n");
    }
}
