use serde_json::Value;

use super::scalar_text;

/// Summary fields in order of interest for a one-line answer.
const PRIORITY_KEYS: [&str; 4] = ["total_cost", "loan_amount", "total_interest", "annuity"];

/// Print just the headline figure of the loan summary.
pub fn print_minimal(value: &Value) {
    let summary = value
        .pointer("/result/summary")
        .or_else(|| value.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = summary {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                println!("{}", scalar_text(val));
                return;
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, scalar_text(val));
            return;
        }
    }

    println!("{}", scalar_text(summary));
}
