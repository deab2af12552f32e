//! Secret serialization.
//!
//! Replaces every [`Secret`](super::Secret) marker in a tree with its value
//! and reports the ids of the secrets that were replaced, so their use can be
//! written to the audit log.

use std::collections::BTreeSet;

use super::value::Value;

/// Replaces secret markers in `value` by their contents, in place.
///
/// Returns the ids of all replaced secrets. A substituted value is used
/// verbatim and not scanned again, so calling this twice yields an empty
/// set the second time and leaves the tree unchanged.
pub fn serialize_secrets(value: &mut Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    serialize_into(value, &mut ids);
    ids
}

fn serialize_into(value: &mut Value, ids: &mut BTreeSet<String>) {
    match value {
        Value::Secret(secret) => {
            ids.insert(std::mem::take(&mut secret.id));
            let inner = std::mem::take(&mut *secret.value);
            *value = inner;
        }
        Value::Sequence(items) => {
            for item in items {
                serialize_into(item, ids);
            }
        }
        Value::Mapping(map) => {
            for item in map.values_mut() {
                serialize_into(item, ids);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::value::{Mapping, Secret};

    fn nested() -> Value {
        let mut creds = Mapping::new();
        creds.insert(
            "password".into(),
            Value::Secret(Secret::new("db.yaml#password", Value::from("hunter2"))),
        );
        creds.insert("user".into(), Value::from("app"));

        let mut root = Mapping::new();
        root.insert(
            "databases".into(),
            Value::Sequence(vec![
                Value::Mapping(creds),
                Value::Secret(Secret::new("token.yaml", Value::from("abc"))),
            ]),
        );
        root.insert("port".into(), Value::from(5432));
        Value::Mapping(root)
    }

    #[test]
    fn test_replaces_nested_secrets() {
        let mut data = nested();
        let ids = serialize_secrets(&mut data);

        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec!["db.yaml#password".to_string(), "token.yaml".to_string()]
        );
        assert_eq!(
            data.to_json(),
            serde_json::json!({
                "databases": [{"password": "hunter2", "user": "app"}, "abc"],
                "port": 5432,
            })
        );
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let mut data = nested();
        serialize_secrets(&mut data);
        let snapshot = data.clone();

        assert!(serialize_secrets(&mut data).is_empty());
        assert_eq!(data, snapshot);
    }

    #[test]
    fn test_substituted_value_not_rescanned() {
        // A secret whose value itself contains a marker is used verbatim.
        let inner = Value::Secret(Secret::new("inner.yaml", Value::from("x")));
        let mut data = Value::Secret(Secret::new("outer.yaml", Value::Sequence(vec![inner.clone()])));

        let ids = serialize_secrets(&mut data);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("outer.yaml"));
        assert_eq!(data, Value::Sequence(vec![inner]));
    }

    #[test]
    fn test_scalars_pass_through() {
        let mut data = Value::from("plain");
        assert!(serialize_secrets(&mut data).is_empty());
        assert_eq!(data, Value::from("plain"));
    }
}
