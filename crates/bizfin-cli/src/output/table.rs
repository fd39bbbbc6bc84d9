use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Scalar fields of the result go into a Field/Value table; every list of
/// records (payments, accruals, projection points) gets its own table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_sections("", map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_sections("", res_map),
        Value::Array(arr) => print_array_table(arr),
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Scalars first, then one table per record list. Records that themselves
/// hold record lists (a scenario and its points) are expanded one by one.
fn print_sections(label: &str, map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut scalars = 0;
    for (key, val) in map {
        if !is_record_list(val) {
            builder.push_record([key.as_str(), &format_value(val)]);
            scalars += 1;
        }
    }
    if scalars > 0 {
        if !label.is_empty() {
            println!("\n{}", label);
        }
        println!("{}", Table::from(builder));
    }

    for (key, val) in map {
        let Value::Array(records) = val else { continue };
        if !is_record_list(val) {
            continue;
        }
        let section = if label.is_empty() {
            key.clone()
        } else {
            format!("{label} / {key}")
        };
        if records.iter().any(has_record_list) {
            for (i, record) in records.iter().enumerate() {
                if let Value::Object(inner) = record {
                    print_sections(&format!("{section} [{}]", record_name(inner, i)), inner);
                }
            }
        } else {
            println!("\n{}", section);
            print_array_table(records);
        }
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if arr.first().is_some_and(Value::is_object))
}

fn has_record_list(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.values().any(is_record_list))
}

fn record_name(map: &Map<String, Value>, index: usize) -> String {
    ["scenario", "id", "name"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_list_detection() {
        assert!(is_record_list(&json!([{ "a": 1 }])));
        assert!(!is_record_list(&json!([1, 2])));
        assert!(!is_record_list(&json!([])));
        assert!(has_record_list(&json!({ "points": [{ "net": "1" }] })));
    }

    #[test]
    fn test_record_name_prefers_scenario() {
        let map = json!({ "scenario": "optimistic", "id": "x" });
        assert_eq!(record_name(map.as_object().unwrap(), 0), "optimistic");
        let unnamed = json!({ "net": "1" });
        assert_eq!(record_name(unnamed.as_object().unwrap(), 2), "2");
    }
}
