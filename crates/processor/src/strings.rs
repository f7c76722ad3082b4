use serde_json::Value;

/// Truncates `s` to `max_len` characters, replacing the tail with `"..."`
/// so the final length is exactly `max_len` when truncation occurs.
pub fn truncate_ellipsis(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let head: String = s.chars().take(keep).collect();
    format!("{head}...")
}

/// Normalizes a field that may arrive as a string, a list, or absent, into
/// an optional string. Mirrors the processor's handling of Person's
/// `title`/`email`/`phone`: `None` stays `None`, a string stays as-is, a
/// non-empty list becomes its first element's string form, an empty list
/// becomes `None`, anything else falsy becomes `None`, otherwise stringify.
pub fn normalize_scalar_or_list(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(value_to_string),
        Some(other) => value_to_string(other),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => Some(value.to_string()),
    }
}

/// Resolves a field that is either a bare id string or an object carrying
/// an `"id"` key, returning the id either way.
pub fn extract_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    }
}

/// Collects ids from a field that may be a single id/object or an array of
/// them, used for `references["organization"]`-style reference lists.
pub fn extract_ref_ids(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(extract_id).collect(),
        Some(other) => extract_id(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_exact_500() {
        let s = "x".repeat(2000);
        let t = truncate_ellipsis(&s, 500);
        assert_eq!(t.chars().count(), 500);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn truncate_noop_when_short() {
        assert_eq!(truncate_ellipsis("short", 500), "short");
    }

    #[test]
    fn normalize_list_first_element() {
        assert_eq!(
            normalize_scalar_or_list(Some(&json!(["x@y.de", "z@y.de"]))),
            Some("x@y.de".to_string())
        );
    }

    #[test]
    fn normalize_empty_list_is_none() {
        assert_eq!(normalize_scalar_or_list(Some(&json!([]))), None);
    }

    #[test]
    fn normalize_absent_is_none() {
        assert_eq!(normalize_scalar_or_list(None), None);
    }

    #[test]
    fn extract_id_from_object() {
        assert_eq!(extract_id(&json!({"id": "https://x/1"})), Some("https://x/1".to_string()));
    }

    #[test]
    fn extract_ref_ids_from_mixed_array() {
        let v = json!(["https://x/1", {"id": "https://x/2"}]);
        assert_eq!(extract_ref_ids(Some(&v)), vec!["https://x/1", "https://x/2"]);
    }
}
