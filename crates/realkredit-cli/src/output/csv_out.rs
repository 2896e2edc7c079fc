use serde_json::{Map, Value};
use std::io;

use super::scalar_text;

/// Write output as CSV to stdout.
///
/// A schedule is written one row per period; otherwise the summary is
/// written as `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some(Value::Array(rows)) = value.pointer("/result/schedule") {
        write_rows(&mut wtr, rows);
    } else if let Some(Value::Object(summary)) = value.pointer("/result/summary") {
        write_pairs(&mut wtr, summary);
    } else if let Value::Object(map) = value {
        write_pairs(&mut wtr, map);
    } else {
        let _ = wtr.write_record([scalar_text(value)]);
    }

    let _ = wtr.flush();
}

fn write_pairs<W: io::Write>(wtr: &mut csv::Writer<W>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &scalar_text(val)]);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for item in rows {
        if let Value::Object(map) = item {
            let record: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(scalar_text).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&record);
        }
    }
}
