//! Static-field store shared by one analysis run.

use ahash::{AHashMap, AHashSet};

use crate::value::Value;

/// Storage for static fields across all classes, plus the set of classes
/// whose `<clinit>` has been attempted this run.
///
/// The store lives on the analysis context and is reset between
/// target-method runs so every call site starts from a clean static state.
#[derive(Debug, Default)]
pub struct StaticFieldStore {
    fields: AHashMap<String, AHashMap<String, Value>>,
    initialized: AHashSet<String>,
}

impl StaticFieldStore {
    pub fn new() -> StaticFieldStore {
        StaticFieldStore::default()
    }

    /// Get a static field value, falling back to `default`.
    pub fn get(&self, class: &str, field: &str, default: Value) -> Value {
        self.fields
            .get(class)
            .and_then(|fields| fields.get(field))
            .cloned()
            .unwrap_or(default)
    }

    pub fn set(&mut self, class: &str, field: &str, value: Value) {
        self.fields
            .entry(class.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Whether `<clinit>` has been attempted (not necessarily completed).
    pub fn is_initialized(&self, class: &str) -> bool {
        self.initialized.contains(class)
    }

    pub fn mark_initialized(&mut self, class: &str) {
        self.initialized.insert(class.to_string());
    }

    pub fn reset(&mut self) {
        self.fields.clear();
        self.initialized.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.initialized.is_empty()
    }

    /// All stored fields, for the verbose report.
    pub fn dump(&self) -> impl Iterator<Item = (&str, &AHashMap<String, Value>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_with_default() {
        let mut store = StaticFieldStore::new();
        assert_eq!(store.get("LA;", "f", Value::Int(9)).as_int(), 9);

        store.set("LA;", "f", Value::Int(5));
        assert_eq!(store.get("LA;", "f", Value::Int(0)).as_int(), 5);
        assert_eq!(store.get("LA;", "g", Value::Int(0)).as_int(), 0);
    }

    #[test]
    fn reset_clears_fields_and_attempted_set() {
        let mut store = StaticFieldStore::new();
        store.set("LA;", "f", Value::Int(5));
        store.mark_initialized("LA;");
        assert!(store.is_initialized("LA;"));

        store.reset();
        assert!(store.is_empty());
        assert!(!store.is_initialized("LA;"));
    }

    #[test]
    fn attempted_bit_is_independent_of_fields() {
        let mut store = StaticFieldStore::new();
        store.mark_initialized("LEmpty;");
        assert!(store.is_initialized("LEmpty;"));
        assert_eq!(store.get("LEmpty;", "f", Value::Null).as_int(), 0);
    }
}
