use serde_json::Value;

const LIST_KEYS: &[&str] = &["senders", "data", "results"];

/// Flattens the sender-name listing into display names.
///
/// Nimba has answered both with a bare array and with an object wrapping the
/// records under `senders`, `data` or `results`; records expose `name`.
pub fn normalize_senders(payload: &Value) -> Vec<String> {
    match payload {
        Value::Array(items) => items.iter().map(display_value).collect(),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(|items| items.iter().map(record_name).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn record_name(record: &Value) -> String {
    match record.get("name") {
        Some(name) => display_value(name),
        None => display_value(record),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_list_is_stringified() {
        assert_eq!(
            normalize_senders(&json!(["SHOP", "ALERTS", 42])),
            vec!["SHOP", "ALERTS", "42"]
        );
    }

    #[test]
    fn wrapped_records_use_name() {
        let payload = json!({
            "count": 2,
            "results": [{"name": "SHOP", "status": "accepted"}, {"name": "ALERTS"}]
        });
        assert_eq!(normalize_senders(&payload), vec!["SHOP", "ALERTS"]);
    }

    #[test]
    fn first_array_key_wins() {
        let payload = json!({
            "senders": "not-a-list",
            "data": [{"name": "FROM_DATA"}],
            "results": [{"name": "FROM_RESULTS"}]
        });
        assert_eq!(normalize_senders(&payload), vec!["FROM_DATA"]);
    }

    #[test]
    fn records_without_name_fall_back_to_text() {
        let payload = json!({"senders": ["PLAIN", {"id": 1}]});
        assert_eq!(normalize_senders(&payload), vec!["PLAIN", r#"{"id":1}"#]);
    }

    #[test]
    fn unknown_shapes_are_empty() {
        assert!(normalize_senders(&json!({"raw": "<html>"})).is_empty());
        assert!(normalize_senders(&json!("text")).is_empty());
    }

    #[test]
    fn normalisation_is_stable() {
        let payload = json!({"data": [{"name": "A"}, {"name": "B"}]});
        assert_eq!(normalize_senders(&payload), normalize_senders(&payload));
    }
}
