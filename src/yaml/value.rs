//! Document model produced by the loader.
//!
//! A resolved YAML document is a tree of [`Value`] nodes. References to
//! secret files produce [`Value::Secret`] markers, which carry the original
//! reference string so their use can be audited later.

use std::collections::BTreeMap;

/// Mapping node. Keys are always strings once loaded.
pub type Mapping = BTreeMap<String, Value>;

/// A secret value, tagged with the reference that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    /// The original reference (e.g. `db.yaml#password`). Safe to log.
    pub id: String,
    /// The resolved secret contents.
    pub value: Box<Value>,
}

impl Secret {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value: Box::new(value),
        }
    }
}

/// A resolved YAML node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Secret(Secret),
}

impl Value {
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Human readable name of the node type, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "list",
            Value::Mapping(_) => "mapping",
            Value::Secret(_) => "secret",
        }
    }

    /// Returns true if any mapping key in the tree contains a literal dot.
    ///
    /// Secret markers are inspected too, since their contents can still be
    /// addressed through an attribute path.
    pub fn contains_dotted_key(&self) -> bool {
        match self {
            Value::Mapping(map) => map
                .iter()
                .any(|(key, value)| key.contains('.') || value.contains_dotted_key()),
            Value::Sequence(items) => items.iter().any(Value::contains_dotted_key),
            Value::Secret(secret) => secret.value.contains_dotted_key(),
            _ => false,
        }
    }

    /// Converts the tree to JSON. Secret markers are replaced by their value
    /// without recording anything; use [`crate::yaml::serialize_secrets`]
    /// when the access must be audited.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(n),
            Value::String(s) => Json::String(s.clone()),
            Value::Sequence(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(map) => Json::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Secret(secret) => secret.value.to_json(),
        }
    }

    /// Builds a tree from JSON data (e.g. a POST body merged into a context).
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(i.into())
                } else if let Some(u) = n.as_u64() {
                    Value::Number(u.into())
                } else {
                    Value::Number(n.as_f64().unwrap_or_default().into())
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Sequence(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Mapping(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(i.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

fn number_to_json(n: &serde_yaml::Number) -> serde_json::Value {
    if let Some(i) = n.as_i64() {
        serde_json::Value::from(i)
    } else if let Some(u) = n.as_u64() {
        serde_json::Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}
