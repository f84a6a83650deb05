//! The append-only ordered collection of parsed test objects.

use crate::testcase::WarehouseEntry;

/// An append-only ordered collection of constructed Runner/Differ objects.
///
/// Not mutated after the [`Parser`](crate::parser::Parser) returns, per the
/// shared-resource policy.
#[derive(Default)]
pub struct Warehouse {
    objects: Vec<WarehouseEntry>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, object: WarehouseEntry) {
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WarehouseEntry> {
        self.objects.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&WarehouseEntry> {
        self.objects.iter().find(|o| o.name() == name)
    }

    /// Drain the warehouse, consuming every object. Used by the Scheduler
    /// when wrapping the Warehouse's contents into Jobs.
    pub fn drain(&mut self) -> Vec<WarehouseEntry> {
        std::mem::take(&mut self.objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::paramset::Value;
    use crate::testcase::builtins::register_builtins;

    #[test]
    fn append_preserves_order() {
        let mut factory = Factory::new();
        register_builtins(&mut factory);
        let mut wh = Warehouse::new();
        for name in ["a", "b", "c"] {
            let mut params = factory.params("Echo").unwrap();
            params.set_value("name", Value::Str(name.to_string())).unwrap();
            params.set("input", "x").unwrap();
            wh.append(factory.create("Echo", params).unwrap());
        }
        let names: Vec<_> = wh.iter().map(|o| o.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
