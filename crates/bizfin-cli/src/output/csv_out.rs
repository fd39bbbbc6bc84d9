use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// A result holding record lists is written as rows of its first list, with
/// nested lists (projection points under each scenario) flattened so every
/// row carries its parent's scalar fields.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match body {
        Value::Object(result) => {
            if let Some(records) = result.values().find_map(record_list) {
                write_rows(&mut wtr, &flatten_rows(records));
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in result {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        }
        Value::Array(arr) => {
            write_rows(&mut wtr, &flatten_rows(arr));
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(body)]);
        }
    }

    let _ = wtr.flush();
}

fn record_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(arr) if arr.first().is_some_and(Value::is_object) => Some(arr),
        _ => None,
    }
}

/// One flat row per leaf record; parent scalars are prefixed to child rows.
fn flatten_rows(records: &[Value]) -> Vec<Map<String, Value>> {
    let mut rows = Vec::new();
    for record in records {
        let Value::Object(map) = record else { continue };
        let mut scalars = Map::new();
        let mut nested = None;
        for (key, val) in map {
            match record_list(val) {
                Some(children) if nested.is_none() => nested = Some(children),
                Some(_) => {}
                None => {
                    scalars.insert(key.clone(), val.clone());
                }
            }
        }
        match nested {
            Some(children) => {
                for child in flatten_rows(children) {
                    let mut row = scalars.clone();
                    row.extend(child);
                    rows.push(row);
                }
            }
            None => rows.push(scalars),
        }
    }
    rows
}

fn write_rows(wtr: &mut csv::Writer<io::StdoutLock<'_>>, rows: &[Map<String, Value>]) {
    let Some(first) = rows.first() else { return };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_scenario_points() {
        let scenarios = json!([
            {
                "scenario": "optimistic",
                "ending_balance": "10",
                "points": [{ "month_offset": 1 }, { "month_offset": 2 }]
            },
            {
                "scenario": "pessimistic",
                "ending_balance": "5",
                "points": [{ "month_offset": 1 }]
            }
        ]);
        let rows = flatten_rows(scenarios.as_array().unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["scenario"], "optimistic");
        assert_eq!(rows[1]["month_offset"], 2);
        assert_eq!(rows[2]["scenario"], "pessimistic");
        assert!(!rows[0].contains_key("points"));
    }

    #[test]
    fn test_flat_records_pass_through() {
        let rows = flatten_rows(json!([{ "a": 1 }, { "a": 2 }]).as_array().unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], 2);
    }
}
