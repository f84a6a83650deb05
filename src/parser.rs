//! Loads a hierarchical configuration file into a [`Warehouse`] (§4.3).
//!
//! Grounded on `original_source/factory/Parser.py`: a block format of
//! `[name] key = value [sub] ... [] []`, walked in pre-order to detect
//! duplicate blocks/parameters, then walked again to dispatch every leaf
//! block (one with no nested blocks) to the [`Factory`]. A block that both
//! declares `type` and has children is `AmbiguousBlock` — the original's
//! "a valid subblock has a type and no children" rule, inverted into an
//! explicit error per the Redesign Flags.
//!
//! Diagnostics are accumulated rather than returned via `Result`: one
//! malformed block never aborts parsing of the rest of the file (§7).

use std::fs;
use std::path::Path;

use crate::error::{Locus, ParserError};
use crate::factory::Factory;
use crate::paramset::Value;
use crate::warehouse::Warehouse;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    full_path: String,
    line: usize,
    params: Vec<(String, String, usize)>,
    children: Vec<Node>,
}

impl Node {
    fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _, _)| k == key).map(|(_, v, _)| v.as_str())
    }
}

/// Everything produced by one `parse` call.
#[derive(Default)]
pub struct ParseOutcome {
    pub diagnostics: Vec<ParserError>,
    pub objects_created: usize,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.is_warning())
    }
}

/// Parse `path`'s contents, populating `warehouse` with every
/// successfully-constructed leaf block.
pub fn parse_file(path: &Path, factory: &Factory, warehouse: &mut Warehouse) -> std::io::Result<ParseOutcome> {
    let text = fs::read_to_string(path)?;
    Ok(parse_str(&text, &path.display().to_string(), factory, warehouse))
}

/// Parse configuration text directly (used by tests and by callers that
/// already have the text in hand).
pub fn parse_str(text: &str, filename: &str, factory: &Factory, warehouse: &mut Warehouse) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    let roots = match tokenize(text, filename, &mut outcome.diagnostics) {
        Some(roots) => roots,
        None => return outcome,
    };

    let Some((root, extra_roots)) = roots.split_first() else {
        return outcome;
    };

    for extra in extra_roots {
        outcome.diagnostics.push(ParserError::ExtraTopLevelBlock {
            locus: Locus::new().with_file(filename).with_line(extra.line).with_block_path(extra.full_path.clone()),
            name: extra.name.clone(),
        });
    }

    let mut seen_blocks = std::collections::HashSet::new();
    let mut seen_params = std::collections::HashSet::new();
    check_duplicates(root, filename, &mut seen_blocks, &mut seen_params, &mut outcome.diagnostics);

    dispatch(root, filename, factory, warehouse, &mut outcome);

    outcome
}

/// Build a tree of [`Node`]s from `[name] ... []` markup. Returns `None`
/// only if the file can't be tokenized at all (mismatched brackets);
/// individual malformed lines are reported and skipped.
fn tokenize(text: &str, filename: &str, diagnostics: &mut Vec<ParserError>) -> Option<Vec<Node>> {
    let open_re = regex::Regex::new(r"^\[([A-Za-z0-9_./-]+)\]$").unwrap();
    let close_re = regex::Regex::new(r"^\[\]$").unwrap();
    let kv_re = regex::Regex::new(r"^([A-Za-z0-9_]+)\s*=\s*(.+)$").unwrap();

    let mut roots: Vec<Node> = Vec::new();
    // Stack of (node, path-so-far); the node itself is pushed into its
    // parent's children only when closed, so we build bottom-up.
    let mut stack: Vec<Node> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = open_re.captures(line) {
            let name = caps[1].to_string();
            let full_path = match stack.last() {
                Some(parent) => format!("{}/{name}", parent.full_path),
                None => name.clone(),
            };
            stack.push(Node {
                name,
                full_path,
                line: line_no,
                params: Vec::new(),
                children: Vec::new(),
            });
            continue;
        }

        if close_re.is_match(line) {
            match stack.pop() {
                Some(node) => match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => roots.push(node),
                },
                None => diagnostics.push(ParserError::ConfigParseError {
                    locus: Locus::new().with_file(filename).with_line(line_no),
                    message: "unmatched '[]' with no open block".to_string(),
                }),
            }
            continue;
        }

        if let Some(caps) = kv_re.captures(line) {
            let key = caps[1].to_string();
            let value = caps[2].trim().to_string();
            match stack.last_mut() {
                Some(node) => node.params.push((key, value, line_no)),
                None => diagnostics.push(ParserError::ConfigParseError {
                    locus: Locus::new().with_file(filename).with_line(line_no),
                    message: format!("parameter '{key}' outside of any block"),
                }),
            }
            continue;
        }

        diagnostics.push(ParserError::ConfigParseError {
            locus: Locus::new().with_file(filename).with_line(line_no),
            message: format!("unrecognized line: {line:?}"),
        });
    }

    while let Some(node) = stack.pop() {
        diagnostics.push(ParserError::ConfigParseError {
            locus: Locus::new().with_file(filename).with_block_path(node.full_path.clone()),
            message: "block was never closed with '[]'".to_string(),
        });
    }

    Some(roots)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn check_duplicates(
    node: &Node,
    filename: &str,
    seen_blocks: &mut std::collections::HashSet<String>,
    seen_params: &mut std::collections::HashSet<String>,
    diagnostics: &mut Vec<ParserError>,
) {
    if !seen_blocks.insert(node.full_path.clone()) {
        diagnostics.push(ParserError::DuplicateBlock {
            locus: Locus::new().with_file(filename).with_line(node.line).with_block_path(node.full_path.clone()),
        });
    }

    for (key, _, line) in &node.params {
        let full_param = format!("{}/{key}", node.full_path);
        if !seen_params.insert(full_param.clone()) {
            diagnostics.push(ParserError::DuplicateParameter {
                locus: Locus::new().with_file(filename).with_line(*line).with_block_path(full_param),
            });
        }
    }

    for child in &node.children {
        check_duplicates(child, filename, seen_blocks, seen_params, diagnostics);
    }
}

fn dispatch(node: &Node, filename: &str, factory: &Factory, warehouse: &mut Warehouse, outcome: &mut ParseOutcome) {
    if !node.children.is_empty() {
        if node.param("type").is_some() {
            outcome.diagnostics.push(ParserError::AmbiguousBlock {
                locus: Locus::new().with_file(filename).with_line(node.line).with_block_path(node.full_path.clone()),
            });
        }
        for child in &node.children {
            dispatch(child, filename, factory, warehouse, outcome);
        }
        return;
    }

    let locus = || Locus::new().with_file(filename).with_line(node.line).with_block_path(node.full_path.clone());

    let Some(type_name) = node.param("type") else {
        outcome.diagnostics.push(ParserError::MissingType { locus: locus() });
        return;
    };

    let Some(mut params) = factory.params(type_name) else {
        outcome.diagnostics.push(ParserError::UnknownType {
            locus: locus(),
            type_name: type_name.to_string(),
        });
        return;
    };

    if let Err(err) = params.set_value("name", Value::Str(node.name.clone())) {
        outcome.diagnostics.push(ParserError::ConstructionFailed {
            locus: locus(),
            type_name: type_name.to_string(),
            message: err.to_string(),
        });
        return;
    }

    let mut construction_failed = false;
    for (key, value, line) in &node.params {
        if key == "type" {
            continue;
        }
        if !params.contains(key) {
            outcome.diagnostics.push(ParserError::UnusedParameter {
                locus: Locus::new().with_file(filename).with_line(*line).with_block_path(node.full_path.clone()),
                name: key.clone(),
            });
            continue;
        }
        if let Err(err) = params.set(key, value) {
            outcome.diagnostics.push(ParserError::ConstructionFailed {
                locus: Locus::new().with_file(filename).with_line(*line).with_block_path(node.full_path.clone()),
                type_name: type_name.to_string(),
                message: err.to_string(),
            });
            construction_failed = true;
        }
    }
    if construction_failed {
        return;
    }

    match factory.create(type_name, params) {
        Ok(object) => {
            warehouse.append(object);
            outcome.objects_created += 1;
        }
        Err(err) => outcome.diagnostics.push(ParserError::ConstructionFailed {
            locus: locus(),
            type_name: type_name.to_string(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::builtins::register_builtins;

    fn factory() -> Factory {
        let mut f = Factory::new();
        register_builtins(&mut f);
        f
    }

    #[test]
    fn empty_file_is_a_no_op() {
        let mut wh = Warehouse::new();
        let outcome = parse_str("", "empty.test", &factory(), &mut wh);
        assert!(wh.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn parses_nested_leaf_blocks() {
        let text = r#"
            [Tests]
              [a]
                type = Echo
                input = "hello"
              []
              [group]
                [b]
                  type = Echo
                  input = "world"
                []
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "nested.test", &factory(), &mut wh);
        assert_eq!(outcome.objects_created, 2);
        assert_eq!(wh.len(), 2);
        assert!(wh.find_by_name("a").is_some());
        assert!(wh.find_by_name("b").is_some());
    }

    #[test]
    fn duplicate_parameter_is_reported() {
        let text = r#"
            [Tests]
              [a]
                type = Echo
                input = "hello"
                input = "again"
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "dup.test", &factory(), &mut wh);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| matches!(d, ParserError::DuplicateParameter { .. })));
    }

    #[test]
    fn unknown_type_is_reported_and_does_not_abort_the_rest_of_the_file() {
        let text = r#"
            [Tests]
              [a]
                type = NoSuchType
              []
              [b]
                type = Echo
                input = "hello"
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "unknown.test", &factory(), &mut wh);
        assert!(outcome.diagnostics.iter().any(|d| matches!(d, ParserError::UnknownType { .. })));
        assert_eq!(wh.len(), 1);
        assert!(wh.find_by_name("b").is_some());
    }

    #[test]
    fn ambiguous_block_is_reported() {
        let text = r#"
            [Tests]
              [group]
                type = Echo
                [child]
                  type = Echo
                []
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "ambiguous.test", &factory(), &mut wh);
        assert!(outcome.diagnostics.iter().any(|d| matches!(d, ParserError::AmbiguousBlock { .. })));
        assert_eq!(wh.len(), 1);
    }

    #[test]
    fn only_the_first_top_level_block_is_the_iteration_root() {
        let text = r#"
            [Tests]
              [a]
                type = Echo
                input = "hello"
              []
            []
            [Other]
              [x]
                type = Echo
                input = "ignored"
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "extra_root.test", &factory(), &mut wh);
        assert_eq!(wh.len(), 1);
        assert!(wh.find_by_name("a").is_some());
        assert!(wh.find_by_name("x").is_none());
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| matches!(d, ParserError::ExtraTopLevelBlock { .. })));
        assert!(!outcome.has_errors());
    }

    #[test]
    fn unused_parameter_is_a_warning_not_a_failure() {
        let text = r#"
            [Tests]
              [a]
                type = Echo
                input = "hello"
                bogus = 1
              []
            []
        "#;
        let mut wh = Warehouse::new();
        let outcome = parse_str(text, "unused.test", &factory(), &mut wh);
        assert!(outcome.diagnostics.iter().any(|d| matches!(d, ParserError::UnusedParameter { .. })));
        assert!(!outcome.has_errors());
        assert_eq!(wh.len(), 1);
    }
}
