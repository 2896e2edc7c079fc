use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use realkredit_core::loan::analysis::{self, LoanAnalysisInput};
use realkredit_core::loan::LoanInputs;

use crate::input;

/// Loan terms shared by every loan command
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LoanArgs {
    /// Bond price in hundreds (e.g. 99.47)
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Cash amount to raise
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Nominal annual interest rate (e.g. 0.05 for 5%)
    #[arg(long)]
    pub interest: Option<Decimal>,

    /// Annual bidrag rate on outstanding debt (e.g. 0.0074)
    #[arg(long)]
    pub bidrag: Option<Decimal>,

    /// Loan term in years
    #[arg(long, default_value = "30")]
    pub maturity: u32,

    /// Payments per year (4 = quarterly, 12 = monthly)
    #[arg(long, default_value = "4")]
    pub n_terms: u32,

    /// Date of the first payment (YYYY-MM-DD)
    #[arg(long)]
    pub first_payment_date: Option<NaiveDate>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the full amortization schedule
#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Interest deduction rate; adds an after-tax schedule (e.g. 0.26)
    #[arg(long)]
    pub tax_rate: Option<Decimal>,
}

/// Arguments for the after-tax schedule
#[derive(Args)]
pub struct AfterTaxArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Interest deduction rate (e.g. 0.26)
    #[arg(long, default_value = "0.26")]
    pub tax_rate: Decimal,
}

fn analysis_input(
    args: &LoanArgs,
    tax_rate: Option<Decimal>,
    include_schedule: bool,
) -> Result<LoanAnalysisInput, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        let mut parsed: LoanAnalysisInput = input::file::read_json(path)?;
        parsed.tax_rate = tax_rate.or(parsed.tax_rate);
        parsed.include_schedule = include_schedule;
        return Ok(parsed);
    }
    if let Some(mut parsed) = input::stdin::read_stdin::<LoanAnalysisInput>()? {
        parsed.tax_rate = tax_rate.or(parsed.tax_rate);
        parsed.include_schedule = include_schedule;
        return Ok(parsed);
    }

    let loan = LoanInputs::new(
        args.price
            .ok_or("--price is required (or provide --input)")?,
        args.face_value
            .ok_or("--face-value is required (or provide --input)")?,
        args.interest
            .ok_or("--interest is required (or provide --input)")?,
        args.bidrag.unwrap_or(dec!(0)),
        args.maturity,
        args.n_terms,
    )?;
    let loan = match args.first_payment_date {
        Some(date) => loan.with_first_payment_date(date)?,
        None => loan,
    };

    Ok(LoanAnalysisInput {
        loan,
        tax_rate,
        include_schedule,
    })
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = analysis_input(&args.loan, args.tax_rate, true)?;
    let result = analysis::analyze_loan(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_summary(args: LoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = analysis_input(&args, None, false)?;
    let result = analysis::analyze_loan(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_after_tax(args: AfterTaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = analysis_input(&args.loan, Some(args.tax_rate), true)?;
    let mut result = analysis::analyze_loan(&input)?;
    if let Some(rows) = result.result.after_tax_schedule.take() {
        result.result.schedule = rows;
    }
    Ok(serde_json::to_value(result)?)
}
