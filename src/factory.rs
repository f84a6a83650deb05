//! Registry of object constructors keyed by type name.
//!
//! The Factory owns the mapping from a type name to (a) a schema-producer
//! that yields a fresh [`ParamSet`] template and (b) a constructor that
//! turns a populated template into a boxed [`Testable`] object.
//!
//! Plugin discovery is an explicit registry populated at program startup
//! rather than a filesystem scan of dynamically-imported modules — see
//! Design Notes. A plugin crate registers its types by calling
//! [`Factory::register`] as a side effect of being linked in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FactoryError;
use crate::paramset::ParamSet;
use crate::testcase::WarehouseEntry;

type SchemaProducer = Arc<dyn Fn() -> ParamSet + Send + Sync>;
type Constructor = Arc<dyn Fn(ParamSet) -> Result<WarehouseEntry, String> + Send + Sync>;

struct Registration {
    schema: SchemaProducer,
    constructor: Constructor,
}

/// Registry of type-name → (schema, constructor) pairs.
///
/// Populated once at startup and read-only during dispatch, per the
/// concurrency model's shared-resource policy.
#[derive(Default)]
pub struct Factory {
    types: HashMap<String, Registration>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under `type_name`. `schema` produces a fresh
    /// [`ParamSet`] template on every call; `constructor` consumes a
    /// populated template (already validated by [`Factory::create`]).
    pub fn register<S, C>(&mut self, type_name: &str, schema: S, constructor: C)
    where
        S: Fn() -> ParamSet + Send + Sync + 'static,
        C: Fn(ParamSet) -> Result<WarehouseEntry, String> + Send + Sync + 'static,
    {
        self.types.insert(
            type_name.to_string(),
            Registration {
                schema: Arc::new(schema),
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// A fresh ParamSet template for `type_name`, or `None` if unregistered.
    pub fn params(&self, type_name: &str) -> Option<ParamSet> {
        self.types.get(type_name).map(|r| (r.schema)())
    }

    /// Validate and construct. Construction itself must not perform I/O
    /// beyond logging, per §4.2.
    pub fn create(
        &self,
        type_name: &str,
        params: ParamSet,
    ) -> Result<WarehouseEntry, FactoryError> {
        let registration = self
            .types
            .get(type_name)
            .ok_or_else(|| FactoryError::UnknownType(type_name.to_string()))?;

        let missing = params.validate();
        if !missing.is_empty() {
            let mut missing: Vec<String> = missing.into_iter().collect();
            missing.sort();
            return Err(FactoryError::InvalidParams {
                type_name: type_name.to_string(),
                missing,
            });
        }

        (registration.constructor)(params).map_err(|message| FactoryError::ConstructionFailed {
            type_name: type_name.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paramset::{ParamOptions, ValueKind};
    use crate::testcase::builtins::register_builtins;

    #[test]
    fn unknown_type_reports_error() {
        let factory = Factory::new();
        let params = ParamSet::new();
        let err = factory.create("NoSuch", params).unwrap_err();
        assert!(matches!(err, FactoryError::UnknownType(t) if t == "NoSuch"));
    }

    #[test]
    fn missing_required_reports_invalid_params() {
        let mut factory = Factory::new();
        factory.register(
            "Thing",
            || {
                let mut p = ParamSet::new();
                p.add("name", ValueKind::Str, ParamOptions::new().required());
                p
            },
            |_params| Err("unreachable".to_string()),
        );
        let params = factory.params("Thing").unwrap();
        let err = factory.create("Thing", params).unwrap_err();
        assert!(matches!(err, FactoryError::InvalidParams { .. }));
    }

    #[test]
    fn echo_runner_registers_and_constructs() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let mut params = factory.params("Echo").unwrap();
        params.set_value("name", crate::paramset::Value::Str("a".into())).unwrap();
        params.set("input", "hello").unwrap();
        assert!(factory.create("Echo", params).is_ok());
    }
}
