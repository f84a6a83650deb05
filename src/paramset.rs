//! Typed, hierarchical parameter containers.
//!
//! A [`ParamSet`] is the schema *and* the storage for one object's
//! constructor arguments: [`Factory::params`](crate::factory::Factory::params)
//! hands out a fresh template, the [`Parser`](crate::parser::Parser) fills it in
//! from raw configuration text, and [`Factory::create`](crate::factory::Factory::create)
//! consumes the populated result.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ParamSetError;

/// The finite set of value kinds a [`Parameter`] may hold.
///
/// `Array` is always an ordered sequence of strings; a raw scalar string
/// assigned to an `Array`-typed parameter is coerced by splitting on
/// whitespace (see [`ParamSet::set`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
    Array,
    /// A nested sub-parameter group, grafted under a prefix.
    Params,
}

/// A value stored in a [`ParamSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<String>),
    Params(ParamSet),
}

impl Value {
    fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Array(_) => ValueKind::Array,
            Value::Params(_) => ValueKind::Params,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_params(&self) -> Option<&ParamSet> {
        match self {
            Value::Params(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_params_mut(&mut self) -> Option<&mut ParamSet> {
        match self {
            Value::Params(p) => Some(p),
            _ => None,
        }
    }

    /// Render the value back to its string form, as used by submission-script
    /// placeholder substitution (see `scheduler::queue_manager`).
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(a) => a.join(" "),
            Value::Params(_) => String::new(),
        }
    }
}

/// A verify predicate plus the diagnostic string to report on rejection.
pub type VerifyFn = fn(&Value) -> bool;

/// A declared parameter's "strict type": a parser applied to the raw string
/// instead of the usual kind-based coercion (§4.1 — e.g. parsing a date
/// string into a broken-down time). Failure is reported as `TypeMismatch`.
pub type StrictTypeFn = fn(&str) -> Result<Value, String>;

/// Options passed to [`ParamSet::add`], built fluently.
#[derive(Clone, Default)]
pub struct ParamOptions {
    required: bool,
    default: Option<Value>,
    verify: Option<(VerifyFn, String)>,
    mutable: bool,
    private: bool,
    doc: String,
    strict_type: Option<StrictTypeFn>,
}

impl ParamOptions {
    pub fn new() -> Self {
        Self {
            mutable: true,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn verify(mut self, f: VerifyFn, message: impl Into<String>) -> Self {
        self.verify = Some((f, message.into()));
        self
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Replace kind-based coercion with a strict-type parser: the raw string
    /// is handed to `f` directly, and a parse failure reports `TypeMismatch`
    /// rather than attempting the parameter's declared `ValueKind` coercion.
    pub fn strict_type(mut self, f: StrictTypeFn) -> Self {
        self.strict_type = Some(f);
        self
    }
}

#[derive(Clone)]
struct Parameter {
    kind: ValueKind,
    required: bool,
    mutable: bool,
    private: bool,
    doc: String,
    verify: Option<(VerifyFn, String)>,
    strict_type: Option<StrictTypeFn>,
    value: Option<Value>,
}

/// A typed, hierarchical parameter container.
///
/// Declaration order is preserved so that `requiredKeys()` and diagnostics
/// read in the order the schema was authored.
#[derive(Clone, Default)]
pub struct ParamSet {
    order: Vec<String>,
    params: HashMap<String, Parameter>,
}

impl fmt::Debug for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSet")
            .field("keys", &self.order)
            .finish()
    }
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter. Panics on a duplicate declaration within the same
    /// schema-authoring call — this is a programmer error in a registered
    /// schema, not a runtime configuration error.
    pub fn add(&mut self, name: &str, kind: ValueKind, options: ParamOptions) {
        assert!(
            !self.params.contains_key(name),
            "parameter '{name}' declared twice in the same ParamSet"
        );
        let value = options.default.clone();
        self.params.insert(
            name.to_string(),
            Parameter {
                kind,
                required: options.required,
                mutable: options.mutable,
                private: options.private,
                doc: options.doc,
                verify: options.verify,
                strict_type: options.strict_type,
                value,
            },
        );
        self.order.push(name.to_string());
    }

    /// Does this set declare `name`?
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn is_private(&self, name: &str) -> bool {
        self.params.get(name).map(|p| p.private).unwrap_or(false)
    }

    /// Assign a raw string, as read from configuration text: applies
    /// quote-stripping and whitespace-split array coercion per §4.1.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(), ParamSetError> {
        let value = self.coerce(name, raw)?;
        self.set_value(name, value)
    }

    /// Assign an already-typed value (used by the Parser for the `name`
    /// parameter, and by programmatic callers).
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), ParamSetError> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| ParamSetError::UnknownParameter(name.to_string()))?;

        if !param.mutable && param.value.is_some() {
            return Err(ParamSetError::ImmutableViolation(name.to_string()));
        }

        if param.kind != value.kind() {
            return Err(ParamSetError::TypeMismatch {
                name: name.to_string(),
                expected: param.kind,
                found: value.kind(),
            });
        }

        if let Some((verify, message)) = &param.verify
            && !verify(&value)
        {
            return Err(ParamSetError::VerifyFailed {
                name: name.to_string(),
                message: message.clone(),
            });
        }

        param.value = Some(value);
        Ok(())
    }

    /// Quote-stripping + whitespace-split array coercion from raw text, or,
    /// when the parameter carries a strict type, that parser's own result.
    fn coerce(&self, name: &str, raw: &str) -> Result<Value, ParamSetError> {
        let param = self
            .params
            .get(name)
            .ok_or_else(|| ParamSetError::UnknownParameter(name.to_string()))?;

        let unquoted = strip_quotes(raw);

        if let Some(parser) = param.strict_type {
            return parser(&unquoted).map_err(|_| ParamSetError::TypeMismatch {
                name: name.to_string(),
                expected: param.kind,
                found: ValueKind::Str,
            });
        }

        Ok(match param.kind {
            ValueKind::Array => {
                let normalized = unquoted.replace('\n', " ");
                Value::Array(
                    normalized
                        .split_whitespace()
                        .map(|s| s.to_string())
                        .collect(),
                )
            }
            ValueKind::Int => {
                let parsed = unquoted.parse::<i64>().map_err(|_| ParamSetError::TypeMismatch {
                    name: name.to_string(),
                    expected: ValueKind::Int,
                    found: ValueKind::Str,
                })?;
                Value::Int(parsed)
            }
            ValueKind::Float => {
                let parsed = unquoted.parse::<f64>().map_err(|_| ParamSetError::TypeMismatch {
                    name: name.to_string(),
                    expected: ValueKind::Float,
                    found: ValueKind::Str,
                })?;
                Value::Float(parsed)
            }
            ValueKind::Bool => {
                let parsed = match unquoted.as_str() {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    _ => {
                        return Err(ParamSetError::TypeMismatch {
                            name: name.to_string(),
                            expected: ValueKind::Bool,
                            found: ValueKind::Str,
                        });
                    }
                };
                Value::Bool(parsed)
            }
            ValueKind::Str => Value::Str(unquoted),
            ValueKind::Params => {
                return Err(ParamSetError::TypeMismatch {
                    name: name.to_string(),
                    expected: ValueKind::Params,
                    found: ValueKind::Str,
                });
            }
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name).and_then(|p| p.value.as_ref())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_array(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(Value::as_array)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Two-argument sub-parameter access: `get(group, name)`.
    pub fn get_nested(&self, group: &str, name: &str) -> Option<&Value> {
        self.get(group).and_then(Value::as_params).and_then(|p| p.get(name))
    }

    pub fn nested_mut(&mut self, group: &str) -> Option<&mut ParamSet> {
        self.params
            .get_mut(group)
            .and_then(|p| p.value.as_mut())
            .and_then(Value::as_params_mut)
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.params.get(name).map(|p| p.value.is_some()).unwrap_or(false)
    }

    /// Names declared required.
    pub fn required_keys(&self) -> HashSet<String> {
        self.order
            .iter()
            .filter(|name| self.params[*name].required)
            .cloned()
            .collect()
    }

    /// Required-but-unset parameter names; empty means the set is valid.
    pub fn validate(&self) -> HashSet<String> {
        self.order
            .iter()
            .filter(|name| {
                let p = &self.params[*name];
                p.required && p.value.is_none()
            })
            .cloned()
            .collect()
    }

    /// Iterate declared parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// A ready-made strict type: parses `MM/DD/YYYY` into an ISO-8601 date
/// string, matching `time.strptime(value, "%m/%d/%Y")` from the original
/// parser. Stored as `Value::Str` since [`ValueKind`] has no dedicated date
/// variant; declare the parameter as `ValueKind::Str` with this strict type.
pub fn parse_mdy_date(raw: &str) -> Result<Value, String> {
    chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .map(|d| Value::Str(d.format("%Y-%m-%d").to_string()))
        .map_err(|e| format!("'{raw}' is not a valid MM/DD/YYYY date: {e}"))
}

fn strip_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParamSet {
        let mut p = ParamSet::new();
        p.add("name", ValueKind::Str, ParamOptions::new().required());
        p.add("count", ValueKind::Int, ParamOptions::new().default_value(Value::Int(1)));
        p.add("tags", ValueKind::Array, ParamOptions::new());
        p.add(
            "base",
            ValueKind::Str,
            ParamOptions::new().immutable(),
        );
        p
    }

    #[test]
    fn quoted_values_round_trip() {
        let mut p = sample();
        p.set("name", "\"x y\"").unwrap();
        assert_eq!(p.get_str("name"), Some("x y"));
    }

    #[test]
    fn array_from_whitespace_split() {
        let mut p = sample();
        p.set("tags", "a b   c\nd").unwrap();
        assert_eq!(p.get_array("tags"), Some(&["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()][..]));
    }

    #[test]
    fn required_then_set_validate() {
        let mut p = sample();
        assert!(p.validate().contains("name"));
        p.set("name", "a").unwrap();
        assert!(!p.validate().contains("name"));
    }

    #[test]
    fn immutable_rejects_second_assignment() {
        let mut p = sample();
        p.set("base", "/tmp").unwrap();
        let err = p.set("base", "/other").unwrap_err();
        assert!(matches!(err, ParamSetError::ImmutableViolation(_)));
    }

    #[test]
    fn mutable_assignment_is_idempotent_last_wins() {
        let mut p = sample();
        p.set("name", "a").unwrap();
        p.set("name", "b").unwrap();
        assert_eq!(p.get_str("name"), Some("b"));
    }

    #[test]
    fn verify_predicate_rejects_value() {
        let mut p = ParamSet::new();
        p.add(
            "dir",
            ValueKind::Str,
            ParamOptions::new().verify(|v| v.as_str().map(|s| s.starts_with('/')).unwrap_or(false), "must be absolute"),
        );
        let err = p.set("dir", "relative").unwrap_err();
        assert!(matches!(err, ParamSetError::VerifyFailed { .. }));
        p.set("dir", "/absolute").unwrap();
    }

    #[test]
    fn type_mismatch_on_bad_int() {
        let mut p = sample();
        let err = p.set("count", "not-a-number").unwrap_err();
        assert!(matches!(err, ParamSetError::TypeMismatch { .. }));
    }

    #[test]
    fn strict_type_parses_date_into_iso_form() {
        let mut p = ParamSet::new();
        p.add("due", ValueKind::Str, ParamOptions::new().strict_type(parse_mdy_date));
        p.set("due", "01/15/2024").unwrap();
        assert_eq!(p.get_str("due"), Some("2024-01-15"));
    }

    #[test]
    fn strict_type_reports_type_mismatch_on_parse_failure() {
        let mut p = ParamSet::new();
        p.add("due", ValueKind::Str, ParamOptions::new().strict_type(parse_mdy_date));
        let err = p.set("due", "not-a-date").unwrap_err();
        assert!(matches!(err, ParamSetError::TypeMismatch { .. }));
    }
}
