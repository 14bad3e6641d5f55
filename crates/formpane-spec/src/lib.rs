//! Formpane manifest model.
//!
//! A manifest lists the forms a task panel can show, binds each form's fields
//! to workbook cells, and declares the selection rules that route the panel
//! to a form. Parsing is plain serde (YAML or JSON); [`Manifest::validate`]
//! collects every invariant violation in one pass.

mod manifest;
mod validation;

pub use manifest::*;
pub use validation::{ManifestError, ManifestIssue, ValidationError};

/// JSON Schema for [`Manifest`] as a `serde_json::Value`.
pub fn generate_schema_value() -> serde_json::Value {
    let schema = schemars::schema_for!(Manifest);
    serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null)
}

/// Pretty-printed JSON Schema for [`Manifest`].
pub fn generate_schema_json_pretty() -> String {
    serde_json::to_string_pretty(&generate_schema_value()).unwrap_or_default()
}
