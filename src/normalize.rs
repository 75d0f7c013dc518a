use serde_json::Value;

use crate::model::ResourceRecord;

/// Returns a copy of `value` with every null-valued map entry removed, at any depth.
///
/// Lists keep their length and order; their elements are normalized in place.
/// Scalars are returned unchanged.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(record) => Value::Object(normalize_record(record)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
    }
}

pub fn normalize_record(record: &ResourceRecord) -> ResourceRecord {
    record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), normalize(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize;
    use serde_json::{Value, json};

    fn has_null_entry(value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().any(has_null_entry),
            Value::Object(record) => record
                .values()
                .any(|value| value.is_null() || has_null_entry(value)),
            _ => false,
        }
    }

    #[test]
    fn strips_nulls_at_every_depth() {
        let input = json!({
            "metadata": {"name": "web-0", "deletionTimestamp": null},
            "spec": {
                "containers": [
                    {"name": "app", "command": null, "ports": [{"containerPort": 80, "hostIP": null}]}
                ]
            },
            "status": null
        });

        let output = normalize(&input);

        assert!(!has_null_entry(&output));
        assert_eq!(
            output,
            json!({
                "metadata": {"name": "web-0"},
                "spec": {"containers": [{"name": "app", "ports": [{"containerPort": 80}]}]}
            })
        );
    }

    #[test]
    fn is_idempotent() {
        let input = json!([{"a": null, "b": {"c": null, "d": [1, null, {"e": null}]}}, "x", 3]);
        let once = normalize(&input);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn keeps_list_length_and_key_order() {
        let input = json!({"z": 1, "y": null, "a": [null, 2, {"q": null}], "m": true});
        let output = normalize(&input);

        let keys = output
            .as_object()
            .map(|record| record.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(output["a"], json!([null, 2, {}]));
    }

    #[test]
    fn leaves_input_untouched() {
        let input = json!({"a": null, "b": 1});
        let snapshot = input.clone();
        let _ = normalize(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(normalize(&json!("text")), json!("text"));
        assert_eq!(normalize(&json!(4.5)), json!(4.5));
        assert_eq!(normalize(&Value::Null), Value::Null);
    }
}
