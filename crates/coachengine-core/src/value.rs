use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared value kind for a topic parameter, carried as an enum tag
/// rather than a free-form string so unknown kinds are a compile error,
/// not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    /// Returns true when `value` is an instance of this kind, including the
    /// "null is never an instance of any declared kind" rule used by the
    /// renderer's `NullParameter` check.
    pub fn matches(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ValueKind::String, ParamValue::String(_)) => true,
            (ValueKind::Number, ParamValue::Number(_)) => true,
            (ValueKind::Boolean, ParamValue::Boolean(_)) => true,
            (ValueKind::Array, ParamValue::Array(_)) => true,
            (ValueKind::Object, ParamValue::Object(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(s)
    }
}

/// A typed parameter value resolved at the API boundary from an untyped
/// JSON request body. The renderer only ever consumes `ParamValue`, never
/// raw `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Array(Vec<ParamValue>),
    Object(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            ParamValue::Null => None,
            ParamValue::String(_) => Some(ValueKind::String),
            ParamValue::Number(_) => Some(ValueKind::Number),
            ParamValue::Boolean(_) => Some(ValueKind::Boolean),
            ParamValue::Array(_) => Some(ValueKind::Array),
            ParamValue::Object(_) => Some(ValueKind::Object),
        }
    }

    /// Canonical textual rendering used by the template substitution policy:
    /// strings render verbatim, numbers/booleans use their canonical form,
    /// arrays/objects render as compact deterministic JSON.
    pub fn render_text(&self) -> String {
        match self {
            ParamValue::Null => String::new(),
            ParamValue::String(s) => s.clone(),
            ParamValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            ParamValue::Boolean(b) => b.to_string(),
            ParamValue::Array(_) | ParamValue::Object(_) => {
                // serde_json::Value's Display is already compact and
                // deterministic for a given input; ParamValue's field order
                // for objects is preserved by serde_json::Map.
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
        }
    }

    /// Convert to a plain `serde_json::Value` for interop with schema
    /// validation and provider payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Null => serde_json::Value::Null,
            ParamValue::String(s) => serde_json::Value::String(s.clone()),
            ParamValue::Number(n) => {
                // Mirrors `render_text`'s scalar path: an integer-valued
                // float renders as `1`, not `1.0`, whether it's the whole
                // value or nested inside an array/object.
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    serde_json::Value::Number((*n as i64).into())
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            ParamValue::Boolean(b) => serde_json::Value::Bool(*b),
            ParamValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ParamValue::to_json).collect())
            }
            ParamValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
        }
    }

    /// Convert from a `serde_json::Value` (e.g. an API request body).
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::String(s) => ParamValue::String(s),
            serde_json::Value::Number(n) => ParamValue::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::Bool(b) => ParamValue::Boolean(b),
            serde_json::Value::Array(items) => {
                ParamValue::Array(items.into_iter().map(ParamValue::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, ParamValue::from_json(v));
                }
                ParamValue::Object(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_renders_without_trailing_zero() {
        assert_eq!(ParamValue::Number(3.0).render_text(), "3");
        assert_eq!(ParamValue::Number(3.5).render_text(), "3.5");
    }

    #[test]
    fn array_renders_as_compact_json() {
        let v = ParamValue::Array(vec![ParamValue::String("a".into()), ParamValue::Number(1.0)]);
        assert_eq!(v.render_text(), r#"["a",1]"#);
    }

    #[test]
    fn kind_matches_expected_variants() {
        assert!(ValueKind::String.matches(&ParamValue::String("x".into())));
        assert!(!ValueKind::String.matches(&ParamValue::Number(1.0)));
    }
}
