use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

use realkredit_core::loan::analysis::{self, LoanAnalysisInput};
use realkredit_core::loan::{LoanInputs, LoanModel};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_tax_rate(tax_rate: &str) -> NapiResult<Decimal> {
    tax_rate.parse::<Decimal>().map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_loan(input_json: String) -> NapiResult<String> {
    let input: LoanAnalysisInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = analysis::analyze_loan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn loan_schedule(input_json: String) -> NapiResult<String> {
    let inputs: LoanInputs = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let model = LoanModel::new(inputs);
    let table = model.table().map_err(to_napi_error)?;
    serde_json::to_string(table).map_err(to_napi_error)
}

#[napi]
pub fn loan_schedule_after_tax(input_json: String, tax_rate: String) -> NapiResult<String> {
    let inputs: LoanInputs = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let model = LoanModel::new(inputs);
    let rows = model
        .table_after_tax(parse_tax_rate(&tax_rate)?)
        .map_err(to_napi_error)?;
    serde_json::to_string(&rows).map_err(to_napi_error)
}
