//! Field-level diff summaries for audit entries

use serde_json::Value;

/// Bookkeeping fields that change on every write
const IGNORED_FIELDS: [&str; 2] = ["updated_at", "created_at"];

/// Summarize the changes between two documents
///
/// Nested objects are walked with dotted paths, so a change to one month's
/// allocation shows up as `allocations.202501.actual: 0 -> -1250`. Returns
/// `None` when nothing but bookkeeping fields changed.
pub fn generate_diff(before: &Value, after: &Value) -> Option<String> {
    let mut changes = Vec::new();
    collect(before, after, "", &mut changes);

    if changes.is_empty() {
        None
    } else {
        Some(changes.join(", "))
    }
}

fn collect(before: &Value, after: &Value, prefix: &str, changes: &mut Vec<String>) {
    match (before, after) {
        (Value::Object(before_obj), Value::Object(after_obj)) => {
            for (key, before_val) in before_obj {
                if prefix.is_empty() && IGNORED_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                let path = join(prefix, key);
                match after_obj.get(key) {
                    Some(after_val) => collect(before_val, after_val, &path, changes),
                    None => changes.push(format!("{}: {} -> (removed)", path, format_value(before_val))),
                }
            }

            for (key, after_val) in after_obj {
                if !before_obj.contains_key(key) {
                    let path = join(prefix, key);
                    changes.push(format!("{}: (added) -> {}", path, format_value(after_val)));
                }
            }
        }
        _ if before != after => {
            let label = if prefix.is_empty() { "value" } else { prefix };
            changes.push(format!(
                "{}: {} -> {}",
                label,
                format_value(before),
                format_value(after)
            ));
        }
        _ => {}
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.chars().count() > 50 {
                let short: String = s.chars().take(47).collect();
                format!("\"{}...\"", short)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_changes() {
        let value = json!({"name": "Groceries", "balance": 1000});
        assert!(generate_diff(&value, &value).is_none());
    }

    #[test]
    fn test_nested_allocation_change() {
        let before = json!({"allocations": {"202501": {"planned": 500, "actual": 0}}});
        let after = json!({"allocations": {"202501": {"planned": 500, "actual": -1250}}});
        assert_eq!(
            generate_diff(&before, &after).as_deref(),
            Some("allocations.202501.actual: 0 -> -1250")
        );
    }

    #[test]
    fn test_added_and_removed_fields() {
        let before = json!({"memo": "old"});
        let after = json!({"payee": "Store"});
        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.contains("memo: \"old\" -> (removed)"));
        assert!(diff.contains("payee: (added) -> \"Store\""));
    }

    #[test]
    fn test_arrays_are_summarized() {
        let before = json!({"splits": [1]});
        let after = json!({"splits": [1, 2]});
        assert_eq!(
            generate_diff(&before, &after).as_deref(),
            Some("splits: [1 items] -> [2 items]")
        );
    }

    #[test]
    fn test_long_strings_truncated() {
        let before = json!({"memo": "a".repeat(60)});
        let after = json!({"memo": "b"});
        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.contains("..."));
    }
}
