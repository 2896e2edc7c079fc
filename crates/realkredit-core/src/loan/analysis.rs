//! One-shot loan analysis wrapped in the standard computation envelope.
//!
//! This is the entry point used by the CLI and the Node bindings: it builds a
//! [`LoanModel`], gathers the summary scalars, the schedule and the optional
//! after-tax view, and reports soft issues as warnings rather than errors.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::loan::inputs::LoanInputs;
use crate::loan::model::LoanModel;
use crate::loan::schedule::ScheduleRow;
use crate::time_value::effective_annual;
use crate::types::{round_display, with_metadata, ComputationOutput, Money, Rate, RATE_DP};
use crate::RealkreditResult;

/// Residual debt above which a warning is raised.
const RESIDUAL_DEBT_WARNING: Money = dec!(0.01);

fn default_include_schedule() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAnalysisInput {
    #[serde(flatten)]
    pub loan: LoanInputs,
    /// Deduction rate applied to interest and bidrag (e.g. 0.26)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Rate>,
    /// Emit the period-by-period table alongside the summary
    #[serde(default = "default_include_schedule")]
    pub include_schedule: bool,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSummary {
    /// Cash raised by the borrower
    pub face_value: Money,
    /// Bond debt owed: face_value / (price / 100)
    pub loan_amount: Money,
    /// loan_amount - face_value
    pub issuance_cost: Money,
    pub n_periods: u32,
    /// Level payment per period excluding bidrag
    pub annuity: Money,
    /// First billed payment including bidrag
    pub first_payment: Money,
    /// Σ (annuity + bidrag)
    pub total_cost: Money,
    /// Σ (interest + bidrag)
    pub total_interest: Money,
    /// Σ interest excluding bidrag
    pub total_bond_interest: Money,
    pub total_bidrag: Money,
    /// Per-period IRR of the borrower cash flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_per_period: Option<Rate>,
    /// (1 + yield_per_period)^n_terms - 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_annual_yield: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_after_tax: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAnalysisOutput {
    pub summary: LoanSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<ScheduleRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_tax_schedule: Option<Vec<ScheduleRow>>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Analyse a mortgage-bond loan: summary, schedule and borrower yield.
pub fn analyze_loan(
    input: &LoanAnalysisInput,
) -> RealkreditResult<ComputationOutput<LoanAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let loan = &input.loan;
    let model = LoanModel::new(loan.clone());

    if loan.price() > dec!(100) {
        warnings.push(format!(
            "Issued above par at {}: bond debt is below the cash raised",
            loan.price()
        ));
    }
    if loan.interest().is_zero() {
        warnings.push("Zero coupon rate: repayment is level and no interest accrues".into());
    }

    let table = model.table()?;
    let first_payment = table.first().map(|r| r.annuity).unwrap_or(Decimal::ZERO);

    let final_debt = model.final_debt()?;
    if final_debt.abs() > RESIDUAL_DEBT_WARNING {
        warnings.push(format!(
            "Residual debt of {} after the final period",
            round_display(final_debt, 6)
        ));
    }

    let (yield_per_period, effective_annual_yield) = match model.yield_to_maturity() {
        Ok(y) => {
            let annual = effective_annual(y, loan.n_terms());
            (
                Some(round_display(y, RATE_DP)),
                annual.map(|a| round_display(a, RATE_DP)),
            )
        }
        Err(e) => {
            warnings.push(format!("Yield to maturity unavailable: {e}"));
            (None, None)
        }
    };

    let (total_cost_after_tax, after_tax_schedule) = match input.tax_rate {
        Some(rate) => {
            let total = model.total_cost_after_tax(rate)?;
            let rows = if input.include_schedule {
                Some(model.table_after_tax(rate)?)
            } else {
                None
            };
            (Some(total), rows)
        }
        None => (None, None),
    };

    let summary = LoanSummary {
        face_value: loan.face_value(),
        loan_amount: model.loan_amount(),
        issuance_cost: model.issuance_cost(),
        n_periods: loan.total_periods(),
        annuity: model.annuity()?,
        first_payment,
        total_cost: model.total_cost()?,
        total_interest: model.total_interest()?,
        total_bond_interest: model.total_bond_interest()?,
        total_bidrag: model.total_bidrag()?,
        yield_per_period,
        effective_annual_yield,
        total_cost_after_tax,
    };

    let schedule = if input.include_schedule {
        table.to_vec()
    } else {
        Vec::new()
    };

    let output = LoanAnalysisOutput {
        summary,
        schedule,
        after_tax_schedule,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment mortgage-bond amortization with proportional bidrag",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_input() -> LoanAnalysisInput {
        LoanAnalysisInput {
            loan: LoanInputs::new(dec!(99.47), dec!(1_000_000), dec!(0.05), dec!(0.0074), 30, 4)
                .unwrap(),
            tax_rate: None,
            include_schedule: true,
        }
    }

    #[test]
    fn test_reference_analysis() {
        let out = analyze_loan(&reference_input()).unwrap();
        let s = &out.result.summary;
        assert_eq!(s.loan_amount, dec!(1005328.24));
        assert_eq!(s.total_cost, dec!(2085604.07));
        assert_eq!(s.total_interest, dec!(1080275.83));
        assert_eq!(s.first_payment, dec!(18079.316));
        assert_eq!(s.n_periods, 120);
        assert_eq!(s.yield_per_period, Some(dec!(0.014474)));
        assert_eq!(s.effective_annual_yield, Some(dec!(0.059167)));
        assert_eq!(out.result.schedule.len(), 120);
        assert!(out.result.after_tax_schedule.is_none());
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_summary_only() {
        let mut input = reference_input();
        input.include_schedule = false;
        input.tax_rate = Some(dec!(0.26));
        let out = analyze_loan(&input).unwrap();
        assert!(out.result.schedule.is_empty());
        assert!(out.result.after_tax_schedule.is_none());
        assert!(out.result.summary.total_cost_after_tax.is_some());
    }

    #[test]
    fn test_after_tax_schedule_included() {
        let mut input = reference_input();
        input.tax_rate = Some(dec!(0.26));
        let out = analyze_loan(&input).unwrap();
        let rows = out.result.after_tax_schedule.unwrap();
        assert_eq!(rows[0].annuity, dec!(14328.436));
    }

    #[test]
    fn test_warnings_for_premium_and_zero_rate() {
        let input = LoanAnalysisInput {
            loan: LoanInputs::new(dec!(101), dec!(100_000), dec!(0), dec!(0), 10, 12).unwrap(),
            tax_rate: None,
            include_schedule: true,
        };
        let out = analyze_loan(&input).unwrap();
        assert_eq!(out.warnings.len(), 2, "{:?}", out.warnings);
    }

    #[test]
    fn test_rejects_bad_tax_rate() {
        let mut input = reference_input();
        input.tax_rate = Some(dec!(1.5));
        assert!(analyze_loan(&input).is_err());
    }

    #[test]
    fn test_deserialize_flattened_input() {
        let json = r#"{
            "price": "99.47",
            "face_value": "1000000",
            "interest": "0.05",
            "bidrag": "0.0074",
            "tax_rate": "0.26"
        }"#;
        let input: LoanAnalysisInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.loan.maturity(), 30);
        assert!(input.include_schedule);
        assert_eq!(input.tax_rate, Some(dec!(0.26)));
    }
}
