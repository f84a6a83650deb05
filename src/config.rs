//! Configuration loading for the harness's own settings.
//!
//! This module loads the harness's TOML settings file (slot budget,
//! timeouts, logging). Test declarations themselves use a different,
//! bespoke format handled by [`crate::parser`] — see Design Notes.

pub mod schema;

pub use schema::*;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Loads harness configuration from a TOML file, applying `${VAR}` /
/// `${VAR:-default}` expansion to every string value before deserializing
/// (§1.1/§6's ambient-config requirement).
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    load_config_str(&content)
}

/// Loads harness configuration from a TOML string. Useful for tests.
pub fn load_config_str(content: &str) -> Result<Config> {
    let mut value: toml::Value = toml::from_str(content).context("Failed to parse config")?;
    expand_env_toml_value(&mut value).map_err(|e| anyhow::anyhow!(e))?;
    value.try_into().context("Failed to deserialize config")
}

/// Recursively expands `${VAR}` references in every string leaf of a parsed
/// TOML document, leaving table/array structure untouched.
fn expand_env_toml_value(value: &mut toml::Value) -> Result<(), String> {
    match value {
        toml::Value::String(s) => {
            *s = expand_env_value(s)?;
        }
        toml::Value::Array(items) => {
            for item in items {
                expand_env_toml_value(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                expand_env_toml_value(v)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Expands environment variable references in a string value.
///
/// Syntax:
/// - `${VAR}` - required, fails if VAR is not set
/// - `${VAR:-default}` - optional, uses "default" if VAR not set
/// - `$$` - escaped dollar sign (becomes single `$`)
pub fn expand_env_value(value: &str) -> Result<String, String> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();

                    let mut var_content = String::new();
                    let mut found_close = false;

                    for c in chars.by_ref() {
                        if c == '}' {
                            found_close = true;
                            break;
                        }
                        var_content.push(c);
                    }

                    if !found_close {
                        return Err(format!("Unclosed variable reference: ${{{var_content}"));
                    }

                    let (var_name, default_value) = if let Some(idx) = var_content.find(":-") {
                        let (name, rest) = var_content.split_at(idx);
                        (name, Some(&rest[2..]))
                    } else {
                        (var_content.as_str(), None)
                    };

                    if var_name.is_empty() {
                        return Err("Empty variable name in ${}".to_string());
                    }

                    match std::env::var(var_name) {
                        Ok(val) => result.push_str(&val),
                        Err(_) => {
                            if let Some(default) = default_value {
                                result.push_str(default);
                            } else {
                                return Err(format!("Required environment variable not set: {var_name}"));
                            }
                        }
                    }
                }
                _ => result.push('$'),
            }
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Expands environment variables in every value of a map. Used to resolve
/// `<KEY>` placeholders before handing metadata to
/// [`QueueManager::render_script`](crate::scheduler::QueueManager::render_script).
pub fn expand_env_hashmap(env: &mut HashMap<String, String>) -> Result<()> {
    for (key, value) in env.iter_mut() {
        *value = expand_env_value(value).map_err(|e| anyhow::anyhow!("Failed to expand env var '{key}': {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_from_empty_document() {
        let config = load_config_str("").unwrap();
        assert_eq!(config.harness.slot_budget, 4);
        assert_eq!(config.harness.log_level, "info");
    }

    #[test]
    fn overrides_are_applied() {
        let config = load_config_str(
            r#"
            [harness]
            log_level = "debug"
            slot_budget = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.harness.slot_budget, 8);
        assert_eq!(config.harness.log_level, "debug");
    }

    #[test]
    fn expand_env_value_escaped_dollar() {
        assert_eq!(expand_env_value("price is $$100").unwrap(), "price is $100");
    }

    #[test]
    fn expand_env_value_unset_required_errors() {
        assert!(expand_env_value("${_HARNESSRS_TEST_NONEXISTENT}").is_err());
    }

    #[test]
    fn expand_env_value_default_used_when_unset() {
        assert_eq!(expand_env_value("${_HARNESSRS_TEST_MISSING:-fallback}").unwrap(), "fallback");
    }
}
