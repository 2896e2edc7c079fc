//! `LoanModel`: memoized read interface over a validated loan.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::OnceCell;

use crate::error::RealkreditError;
use crate::loan::inputs::LoanInputs;
use crate::loan::schedule::{self, AmortizationTable, Schedule, ScheduleRow};
use crate::time_value::irr;
use crate::types::{round_display, Money, Price, Rate, ROW_DP, SUMMARY_DP};
use crate::RealkreditResult;

const DEFAULT_YIELD_GUESS: Rate = dec!(0.01);

/// A fixed-rate mortgage-bond loan and its derived schedule.
///
/// The amortization table is built on first access and cached; every
/// accessor is a pure function of the inputs.
#[derive(Debug, Clone)]
pub struct LoanModel {
    inputs: LoanInputs,
    table: OnceCell<AmortizationTable>,
}

impl LoanModel {
    pub fn new(inputs: LoanInputs) -> Self {
        LoanModel {
            inputs,
            table: OnceCell::new(),
        }
    }

    /// Validate the six loan terms and build a model from them.
    pub fn from_terms(
        price: Price,
        face_value: Money,
        interest: Rate,
        bidrag: Rate,
        maturity: u32,
        n_terms: u32,
    ) -> RealkreditResult<Self> {
        let inputs = LoanInputs::new(price, face_value, interest, bidrag, maturity, n_terms)?;
        Ok(LoanModel::new(inputs))
    }

    pub fn inputs(&self) -> &LoanInputs {
        &self.inputs
    }

    fn amortization(&self) -> RealkreditResult<&AmortizationTable> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let table = schedule::generate(&self.inputs)?;
        Ok(self.table.get_or_init(|| table))
    }

    /// Bond debt owed, rounded to 2 dp.
    pub fn loan_amount(&self) -> Money {
        round_display(self.inputs.loan_amount(), SUMMARY_DP)
    }

    /// Level payment per period excluding bidrag, rounded to 3 dp.
    pub fn annuity(&self) -> RealkreditResult<Money> {
        Ok(round_display(self.amortization()?.annuity, ROW_DP))
    }

    /// Lazy, restartable walk over the full-precision periods.
    pub fn schedule(&self) -> RealkreditResult<Schedule> {
        Schedule::new(&self.inputs)
    }

    pub fn table(&self) -> RealkreditResult<&[ScheduleRow]> {
        Ok(&self.amortization()?.rows)
    }

    /// Σ (annuity + bidrag): everything the borrower pays.
    pub fn total_cost(&self) -> RealkreditResult<Money> {
        Ok(round_display(
            self.amortization()?.totals.total_cost,
            SUMMARY_DP,
        ))
    }

    /// Σ (interest + bidrag): the financing cost including fees.
    pub fn total_interest(&self) -> RealkreditResult<Money> {
        Ok(round_display(
            self.amortization()?.totals.total_interest,
            SUMMARY_DP,
        ))
    }

    /// Σ interest, excluding bidrag.
    pub fn total_bond_interest(&self) -> RealkreditResult<Money> {
        Ok(round_display(
            self.amortization()?.totals.total_bond_interest,
            SUMMARY_DP,
        ))
    }

    pub fn total_bidrag(&self) -> RealkreditResult<Money> {
        Ok(round_display(
            self.amortization()?.totals.total_bidrag,
            SUMMARY_DP,
        ))
    }

    /// Unrounded debt left after the final period.
    pub fn final_debt(&self) -> RealkreditResult<Money> {
        Ok(self.amortization()?.totals.final_debt)
    }

    /// Borrower cash flow: cash received, then every billed payment.
    pub fn cash_flows(&self) -> RealkreditResult<Vec<Money>> {
        let schedule = self.schedule()?;
        let mut flows = Vec::with_capacity(schedule.len() + 1);
        flows.push(-self.inputs.face_value());
        flows.extend(schedule.map(|p| p.payment()));
        Ok(flows)
    }

    /// Per-period internal rate of the borrower cash flow, unrounded.
    pub fn yield_to_maturity(&self) -> RealkreditResult<Rate> {
        let guess = self.inputs.period_rate() + self.inputs.period_bidrag_rate();
        let guess = if guess.is_zero() {
            DEFAULT_YIELD_GUESS
        } else {
            guess
        };
        irr(&self.cash_flows()?, guess)
    }

    /// Table with interest and bidrag reduced by a deduction at `tax_rate`.
    pub fn table_after_tax(&self, tax_rate: Rate) -> RealkreditResult<Vec<ScheduleRow>> {
        schedule::after_tax_rows(self.schedule()?, tax_rate)
    }

    /// Issuance loss: bond debt in excess of the cash raised.
    pub fn issuance_cost(&self) -> Money {
        round_display(
            self.inputs.loan_amount() - self.inputs.face_value(),
            SUMMARY_DP,
        )
    }

    /// Σ billed payments after a deduction at `tax_rate`.
    pub fn total_cost_after_tax(&self, tax_rate: Rate) -> RealkreditResult<Money> {
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(RealkreditError::invalid(
                "tax_rate",
                "Tax rate must be between 0 and 1",
            ));
        }
        let totals = &self.amortization()?.totals;
        let deductible = totals.total_interest * tax_rate;
        Ok(round_display(totals.total_cost - deductible, SUMMARY_DP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_value::effective_annual;

    fn reference_model() -> LoanModel {
        LoanModel::from_terms(dec!(99.47), dec!(1_000_000), dec!(0.05), dec!(0.0074), 30, 4)
            .unwrap()
    }

    #[test]
    fn test_reference_summary() {
        let model = reference_model();
        assert_eq!(model.loan_amount(), dec!(1005328.24));
        assert_eq!(model.total_cost().unwrap(), dec!(2085604.07));
        assert_eq!(model.total_interest().unwrap(), dec!(1080275.83));
        assert_eq!(model.total_bond_interest().unwrap(), dec!(941006.82));
        assert_eq!(model.annuity().unwrap(), dec!(16219.459));
        assert_eq!(model.issuance_cost(), dec!(5328.24));
    }

    #[test]
    fn test_total_interest_splits_into_bond_interest_and_bidrag() {
        let model = reference_model();
        let sum = model.total_bond_interest().unwrap() + model.total_bidrag().unwrap();
        assert!((sum - model.total_interest().unwrap()).abs() <= dec!(0.01));
    }

    #[test]
    fn test_table_is_memoized() {
        let model = reference_model();
        let first = model.table().unwrap().as_ptr();
        let second = model.table().unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_schedule_matches_table() {
        let model = reference_model();
        let from_iter: Vec<ScheduleRow> = model.schedule().unwrap().map(|p| p.to_row()).collect();
        assert_eq!(from_iter.as_slice(), model.table().unwrap());
    }

    #[test]
    fn test_cash_flows_shape() {
        let model = reference_model();
        let flows = model.cash_flows().unwrap();
        assert_eq!(flows.len(), 121);
        assert_eq!(flows[0], dec!(-1_000_000));
        assert_eq!(round_display(flows[1], 3), dec!(18079.316));
    }

    #[test]
    fn test_yield_exceeds_coupon_with_discount_and_bidrag() {
        let model = reference_model();
        let y = model.yield_to_maturity().unwrap();
        assert!((y - dec!(0.014474)).abs() < dec!(0.000001), "got {y}");
        let annual = effective_annual(y, model.inputs().n_terms()).unwrap();
        assert!((annual - dec!(0.059167)).abs() < dec!(0.000001), "got {annual}");
    }

    #[test]
    fn test_yield_at_par_without_bidrag_equals_coupon() {
        let model =
            LoanModel::from_terms(dec!(100), dec!(500_000), dec!(0.04), dec!(0), 20, 12).unwrap();
        let y = model.yield_to_maturity().unwrap();
        assert!((y - dec!(0.04) / dec!(12)).abs() < dec!(0.0000001), "got {y}");
    }

    #[test]
    fn test_after_tax_total_cost() {
        let model = reference_model();
        let full = model.total_cost().unwrap();
        let after = model.total_cost_after_tax(dec!(0.26)).unwrap();
        let expected = full - model.total_interest().unwrap() * dec!(0.26);
        assert!((after - expected).abs() <= dec!(0.01));
        assert!(model.total_cost_after_tax(dec!(2)).is_err());
    }

    #[test]
    fn test_non_amortizing_surfaces_from_accessors() {
        let model = LoanModel::from_terms(dec!(100), dec!(1000), dec!(1000), dec!(0), 30, 4)
            .unwrap();
        assert!(matches!(
            model.total_cost(),
            Err(RealkreditError::NonAmortizingLoan { .. })
        ));
        assert!(matches!(
            model.table(),
            Err(RealkreditError::NonAmortizingLoan { .. })
        ));
        // Construction-time values stay available.
        assert_eq!(model.loan_amount(), dec!(1000));
    }
}
