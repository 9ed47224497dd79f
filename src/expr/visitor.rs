//! Stored-field visitor
//!
//! Expressions that read stored fields register the field names they
//! need during `start_collect`. For each document the index then asks
//! `needs_field` per stored field and loads only the accepted ones into
//! the visitor's scratch storage. The scratch is reset between
//! documents; the required-field set is retained for the whole scan.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// Name of the stored source field carrying the whole document.
pub const SOURCE_FIELD: &str = "_source";

/// Collects the stored fields required by the current scan.
#[derive(Debug, Default)]
pub struct FieldsVisitor {
    required_fields: HashSet<String>,
    required: bool,
    source: Option<Value>,
    fields: HashMap<String, Value>,
}

impl FieldsVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a required stored field.
    ///
    /// Returns whether the field was newly added.
    pub fn add_field(&mut self, name: impl Into<String>) -> bool {
        self.required = true;
        self.required_fields.insert(name.into())
    }

    /// Whether any expression requires stored fields.
    pub fn required(&self) -> bool {
        self.required
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    /// Whether the index should load this stored field.
    pub fn needs_field(&self, name: &str) -> bool {
        name == SOURCE_FIELD || self.required_fields.contains(name)
    }

    /// Clears per-document scratch storage, keeping the required set.
    pub fn reset(&mut self) {
        self.source = None;
        self.fields.clear();
    }

    pub fn set_source(&mut self, source: Value) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&Value> {
        self.source.as_ref()
    }

    /// Stores one loaded field value for the current document.
    pub fn add_value(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
