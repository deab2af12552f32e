//! Shape of env files and the merged environment.
//!
//! Env files are validated structurally against [`env_file_schema`] before
//! they are merged. Defaults are not filled at that stage: a key that is
//! absent inherits from the files before it, while an explicitly set key
//! overrides them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::yaml::{serialize_secrets, Mapping, Value};

pub const REQUEST: &str = "request";
pub const TEMPLATE: &str = "template";
pub const RESPONSE: &str = "response";

/// JSON schema every `*scs-env.yaml` file must conform to.
pub fn env_file_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "request": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "methods": {
                        "type": "array",
                        "items": {"enum": ["GET", "POST"]}
                    },
                    "schema": {"type": "object"}
                }
            },
            "template": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "enabled": {"type": "boolean"},
                    "context": {"type": "object"},
                    "rendering_options": {"type": "object"}
                }
            },
            "response": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "status": {"type": "integer", "minimum": 100, "maximum": 599},
                    "headers": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    }
                }
            }
        }
    })
}

/// Compiles a JSON schema (draft 2020-12).
pub fn compile_schema(schema: &serde_json::Value) -> Result<Validator, String> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| format!("invalid schema: {err}"))
}

fn env_file_validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        compile_schema(&env_file_schema()).expect("embedded env file schema compiles")
    })
}

/// Validates the contents of one env file, returning all violations.
pub fn validate_env_file(data: &serde_json::Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = env_file_validator()
        .iter_errors(data)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The merged environment of a request path.
///
/// Values may still contain secret markers. Call
/// [`Environment::serialize_secrets`] before converting it with
/// [`Environment::into_resolved`].
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    sections: Mapping,
}

impl Default for Environment {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Environment {
    /// All defaults, the starting point of every merge.
    pub fn defaults() -> Self {
        let mut request = Mapping::new();
        request.insert(
            "methods".into(),
            Value::Sequence(vec![Value::from("GET")]),
        );
        request.insert("schema".into(), Value::Mapping(Mapping::new()));

        let mut template = Mapping::new();
        template.insert("enabled".into(), Value::Bool(true));
        template.insert("context".into(), Value::Mapping(Mapping::new()));
        template.insert("rendering_options".into(), Value::Mapping(Mapping::new()));

        let mut response = Mapping::new();
        response.insert("status".into(), Value::from(200));
        response.insert("headers".into(), Value::Mapping(Mapping::new()));

        let mut sections = Mapping::new();
        sections.insert(REQUEST.into(), Value::Mapping(request));
        sections.insert(TEMPLATE.into(), Value::Mapping(template));
        sections.insert(RESPONSE.into(), Value::Mapping(response));
        Self { sections }
    }

    /// Merges one env file on top of the environment.
    ///
    /// Sections are never replaced as a whole. Inside a section, a mapping
    /// value is merged key by key into the existing mapping; any other
    /// value replaces the existing one. The merge does not go deeper: a
    /// nested mapping inside e.g. `template.context` replaces its
    /// counterpart.
    pub fn merge(&mut self, overrides: Mapping) {
        for (section_name, section) in overrides {
            let Value::Mapping(children) = section else {
                continue;
            };
            let target = self
                .sections
                .entry(section_name)
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            let Some(target) = target.as_mapping_mut() else {
                continue;
            };
            for (key, value) in children {
                match (target.get_mut(&key), value) {
                    (Some(Value::Mapping(existing)), Value::Mapping(update)) => {
                        existing.extend(update);
                    }
                    (_, value) => {
                        target.insert(key, value);
                    }
                }
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.as_mapping()?.get(key)
    }

    /// Replaces all secret markers, returning the ids of the secrets used.
    pub fn serialize_secrets(&mut self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for section in self.sections.values_mut() {
            ids.extend(serialize_secrets(section));
        }
        ids
    }

    /// Converts the environment into its typed form.
    pub fn into_resolved(self) -> Result<ResolvedEnvironment, String> {
        let json = Value::Mapping(self.sections).to_json();
        serde_json::from_value(json).map_err(|err| err.to_string())
    }
}

/// The typed, secret-free environment handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResolvedEnvironment {
    pub request: RequestSection,
    pub template: TemplateSection,
    pub response: ResponseSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RequestSection {
    pub methods: Vec<String>,
    /// JSON schema for POST bodies. Empty means no validation.
    pub schema: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateSection {
    pub enabled: bool,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub rendering_options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseSection {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    pub fn allows_method(&self, method: &str) -> bool {
        self.request
            .methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }
}
