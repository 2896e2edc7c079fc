use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::scalar_text;

/// Format the loan summary and schedule as terminal tables.
pub fn print_table(value: &Value) {
    let Value::Object(envelope) = value else {
        println!("{}", value);
        return;
    };

    match envelope.get("result") {
        Some(Value::Object(result)) => {
            for (section, content) in result {
                match content {
                    Value::Object(map) => {
                        println!("{}", heading(section));
                        println!("{}", field_table(map));
                    }
                    Value::Array(rows) => {
                        println!("{}", heading(section));
                        println!("{}", row_table(rows));
                    }
                    _ => {}
                }
                println!();
            }
            print_footer(envelope);
        }
        _ => println!("{}", field_table(envelope)),
    }
}

fn heading(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

fn field_table(map: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &scalar_text(val)]);
    }
    builder.build()
}

fn row_table(rows: &[Value]) -> Table {
    let mut builder = Builder::default();
    if let Some(Value::Object(first)) = rows.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        builder.push_record(headers.clone());
        for item in rows {
            if let Value::Object(map) = item {
                let record: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(scalar_text).unwrap_or_default())
                    .collect();
                builder.push_record(record);
            }
        }
    }
    builder.build()
}

fn print_footer(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("Warnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
            println!();
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("Methodology: {}", meth);
    }
}
