use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "rounded",
        "runway",
        "mrr",
        "recurring_total",
        "implementation_total",
    ];

    if let Value::Object(map) = result_obj {
        // One ending balance per projected scenario.
        if let Some(Value::Array(scenarios)) = map.get("scenarios") {
            for s in scenarios {
                println!(
                    "{}: {}",
                    s.get("scenario").map(format_minimal).unwrap_or_default(),
                    s.get("ending_balance").map(format_minimal).unwrap_or_default()
                );
            }
            return;
        }

        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some(Value::Array(accruals)) = map.get("accruals") {
            println!("{} accrual(s)", accruals.len());
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    if let Value::Array(items) = result_obj {
        for item in items {
            println!("{}", format_minimal(item.get("date").unwrap_or(item)));
        }
        return;
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // Runway: {"type": "months", "months": "20"} or {"type": "infinite"}
        Value::Object(map) if map.contains_key("type") => map
            .get("months")
            .map(format_minimal)
            .unwrap_or_else(|| map.get("type").map(format_minimal).unwrap_or_default()),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_runway_formats() {
        assert_eq!(format_minimal(&json!({ "type": "months", "months": "20" })), "20");
        assert_eq!(format_minimal(&json!({ "type": "infinite" })), "infinite");
    }
}
