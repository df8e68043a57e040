//! Declarative, language-neutral description of a topic's result schema.
//!
//! A nested record of field name -> `{kind, required?, nested schema?}`,
//! generic enough that the extractor can emit a normalized textual
//! rendering for the prompt and the parser can validate the LLM's JSON
//! output against the same description, without generating per-topic
//! Rust types.

use std::collections::BTreeMap;

use coachengine_core::ValueKind;
use serde::{Deserialize, Serialize};

/// One field of a result schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub kind: ValueKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Present when `kind` is `Object` — the nested field set.
    #[serde(default)]
    pub object_fields: Option<ResultSchema>,
    /// Present when `kind` is `Array` — the schema each element must match
    /// when elements are objects. `None` means elements are unconstrained
    /// (or are a scalar kind, validated structurally only as "is an array").
    #[serde(default)]
    pub array_item_fields: Option<ResultSchema>,
}

impl SchemaField {
    pub fn required(kind: ValueKind) -> Self {
        Self { kind, required: true, description: None, object_fields: None, array_item_fields: None }
    }

    pub fn optional(kind: ValueKind) -> Self {
        Self { kind, required: false, description: None, object_fields: None, array_item_fields: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_object_fields(mut self, fields: ResultSchema) -> Self {
        self.object_fields = Some(fields);
        self
    }

    pub fn with_array_item_fields(mut self, fields: ResultSchema) -> Self {
        self.array_item_fields = Some(fields);
        self
    }
}

/// A named, ordered field set describing the object a structured-output
/// extraction must produce. `BTreeMap` keeps field order deterministic for
/// the normalized prompt rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSchema {
    pub fields: BTreeMap<String, SchemaField>,
    /// When true, JSON object keys not present in `fields` are tolerated
    /// instead of rejected.
    #[serde(default)]
    pub allow_unknown_fields: bool,
}

impl ResultSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: SchemaField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn allow_unknown_fields(mut self) -> Self {
        self.allow_unknown_fields = true;
        self
    }

    /// Render a normalized textual form for injection into the extraction
    /// prompt — deterministic field order, one line per field.
    pub fn render_prompt_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Respond with a single JSON object with exactly these fields:\n");
        for (name, field) in &self.fields {
            let req = if field.required { "required" } else { "optional" };
            let desc = field.description.as_deref().unwrap_or("");
            out.push_str(&format!("- \"{name}\" ({}, {req}){}{}\n",
                field.kind,
                if desc.is_empty() { "" } else { ": " },
                desc,
            ));
            if let Some(nested) = &field.object_fields {
                for line in nested.render_prompt_text().lines().skip(1) {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            if let Some(item_fields) = &field.array_item_fields {
                out.push_str("  each array element is an object with fields:\n");
                for line in item_fields.render_prompt_text().lines().skip(1) {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        if !self.allow_unknown_fields {
            out.push_str("Do not include any fields other than the ones listed above.\n");
        }
        out
    }

    /// Validate a parsed JSON value against this schema. Strict: missing
    /// required fields are a failure; unknown fields are a failure unless
    /// `allow_unknown_fields` is set.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), SchemaValidationError> {
        let obj = value
            .as_object()
            .ok_or(SchemaValidationError::NotAnObject)?;

        for (name, field) in &self.fields {
            match obj.get(name) {
                None if field.required => {
                    return Err(SchemaValidationError::MissingField(name.clone()));
                }
                None => continue,
                Some(v) => validate_field(name, field, v)?,
            }
        }

        if !self.allow_unknown_fields {
            for key in obj.keys() {
                if !self.fields.contains_key(key) {
                    return Err(SchemaValidationError::UnknownField(key.clone()));
                }
            }
        }

        Ok(())
    }
}

fn validate_field(name: &str, field: &SchemaField, v: &serde_json::Value) -> Result<(), SchemaValidationError> {
    let kind_ok = match field.kind {
        ValueKind::String => v.is_string(),
        ValueKind::Number => v.is_number(),
        ValueKind::Boolean => v.is_boolean(),
        ValueKind::Array => v.is_array(),
        ValueKind::Object => v.is_object(),
    };
    if !kind_ok {
        return Err(SchemaValidationError::WrongKind {
            field: name.to_string(),
            expected: field.kind,
        });
    }

    if let (ValueKind::Object, Some(nested)) = (field.kind, &field.object_fields) {
        nested.validate(v).map_err(|e| SchemaValidationError::Nested(name.to_string(), Box::new(e)))?;
    }

    if let (ValueKind::Array, Some(item_fields)) = (field.kind, &field.array_item_fields) {
        for (idx, item) in v.as_array().unwrap().iter().enumerate() {
            item_fields
                .validate(item)
                .map_err(|e| SchemaValidationError::NestedArrayItem(name.to_string(), idx, Box::new(e)))?;
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("top-level value is not a JSON object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("unexpected field '{0}'")]
    UnknownField(String),
    #[error("field '{field}' does not have kind {expected}")]
    WrongKind { field: String, expected: ValueKind },
    #[error("nested field '{0}': {1}")]
    Nested(String, Box<SchemaValidationError>),
    #[error("array field '{0}' item {1}: {2}")]
    NestedArrayItem(String, usize, Box<SchemaValidationError>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_values_schema() -> ResultSchema {
        ResultSchema::new().field(
            "values",
            SchemaField::required(ValueKind::Array).with_array_item_fields(
                ResultSchema::new()
                    .field("name", SchemaField::required(ValueKind::String))
                    .field("importance_rank", SchemaField::required(ValueKind::Number)),
            ),
        )
    }

    #[test]
    fn validates_well_formed_result() {
        let schema = core_values_schema();
        let value = serde_json::json!({
            "values": [
                {"name": "integrity", "importance_rank": 1},
                {"name": "innovation", "importance_rank": 2}
            ]
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn missing_required_field_fails() {
        let schema = core_values_schema();
        let value = serde_json::json!({});
        assert!(matches!(
            schema.validate(&value),
            Err(SchemaValidationError::MissingField(f)) if f == "values"
        ));
    }

    #[test]
    fn unknown_field_rejected_by_default() {
        let schema = core_values_schema();
        let value = serde_json::json!({"values": [], "extra": 1});
        assert!(matches!(schema.validate(&value), Err(SchemaValidationError::UnknownField(_))));
    }

    #[test]
    fn unknown_field_tolerated_when_allowed() {
        let schema = core_values_schema().allow_unknown_fields();
        let value = serde_json::json!({"values": [], "extra": 1});
        assert!(schema.validate(&value).is_ok());
    }
}
