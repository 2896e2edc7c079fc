//! Period-by-period amortization of a level-payment mortgage-bond loan.
//!
//! The walk carries the outstanding debt at full decimal precision; rounding
//! happens only when a [`Period`] is turned into a [`ScheduleRow`]. Interest
//! and bidrag for a period are both charged on the balance owed at the start
//! of that period.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

use crate::error::RealkreditError;
use crate::loan::inputs::LoanInputs;
use crate::time_value::level_payment;
use crate::types::{round_display, Money, Rate, ROW_DP};
use crate::RealkreditResult;

/// Residual debt tolerated after the final period.
pub const TERMINAL_DEBT_TOLERANCE: Money = dec!(1);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One payment period at full precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    /// 1-based period index
    pub time: u32,
    pub payment_date: Option<NaiveDate>,
    /// Level payment excluding bidrag
    pub annuity: Money,
    pub repayment: Money,
    pub interest: Money,
    pub bidrag: Money,
    /// Outstanding debt after this period's repayment
    pub debt: Money,
}

impl Period {
    /// Amount billed to the borrower: annuity plus bidrag.
    pub fn payment(&self) -> Money {
        self.annuity + self.bidrag
    }

    /// Balance owed at the start of the period.
    pub fn opening_debt(&self) -> Money {
        self.debt + self.repayment
    }

    pub fn to_row(&self) -> ScheduleRow {
        ScheduleRow {
            time: self.time,
            payment_date: self.payment_date,
            annuity: round_display(self.payment(), ROW_DP),
            repayment: round_display(self.repayment, ROW_DP),
            interest: round_display(self.interest, ROW_DP),
            debt: round_display(self.debt, ROW_DP),
            bidrag: round_display(self.bidrag, ROW_DP),
        }
    }
}

/// A presentation row of the amortization table, rounded to 3 dp.
///
/// `annuity` is the billed payment and therefore includes `bidrag`:
/// `annuity == repayment + interest + bidrag` up to rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleRow {
    pub time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    pub annuity: Money,
    pub repayment: Money,
    pub interest: Money,
    pub debt: Money,
    pub bidrag: Money,
}

/// Full-precision sums over a completed schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTotals {
    /// Σ (annuity + bidrag)
    pub total_cost: Money,
    /// Σ (interest + bidrag)
    pub total_interest: Money,
    /// Σ interest
    pub total_bond_interest: Money,
    /// Σ bidrag
    pub total_bidrag: Money,
    /// Σ repayment
    pub total_repayment: Money,
    pub final_debt: Money,
}

impl ScheduleTotals {
    fn add(&mut self, period: &Period) {
        self.total_cost += period.payment();
        self.total_interest += period.interest + period.bidrag;
        self.total_bond_interest += period.interest;
        self.total_bidrag += period.bidrag;
        self.total_repayment += period.repayment;
        self.final_debt = period.debt;
    }
}

/// A completed, validated schedule.
#[derive(Debug, Clone)]
pub struct AmortizationTable {
    pub annuity: Money,
    pub rows: Vec<ScheduleRow>,
    pub totals: ScheduleTotals,
}

// ---------------------------------------------------------------------------
// Lazy schedule
// ---------------------------------------------------------------------------

/// Lazy iterator over the periods of a loan.
///
/// Cloning or re-creating a `Schedule` restarts the walk; there is no
/// shared state between instances.
#[derive(Debug, Clone)]
pub struct Schedule {
    annuity: Money,
    rate: Rate,
    fee_rate: Rate,
    debt: Money,
    next_time: u32,
    total_periods: u32,
    first_payment_date: Option<NaiveDate>,
    months_per_term: u32,
}

impl Schedule {
    /// Prepare the walk, failing if the level payment cannot cover the
    /// first period's interest.
    ///
    /// Horizons long enough that the level payment equals interest-only at
    /// Decimal precision are reported as [`RealkreditError::NonAmortizingLoan`]
    /// as well: no repayment would register in any period.
    pub fn new(inputs: &LoanInputs) -> RealkreditResult<Self> {
        let principal = inputs.loan_amount();
        let rate = inputs.period_rate();
        let fee_rate = inputs.period_bidrag_rate();
        let total_periods = inputs.total_periods();
        let annuity = level_payment(principal, rate, total_periods)?;

        let first_interest = principal.checked_mul(rate).ok_or_else(out_of_range)?;
        if annuity <= first_interest {
            return Err(non_amortizing(annuity, first_interest));
        }

        // Opening debt only falls, so every running total is bounded by
        // the first period's billed payment times the period count.
        principal
            .checked_mul(fee_rate)
            .and_then(|bidrag| bidrag.checked_add(annuity))
            .and_then(|payment| payment.checked_mul(Decimal::from(total_periods)))
            .ok_or_else(out_of_range)?;

        Ok(Schedule {
            annuity,
            rate,
            fee_rate,
            debt: principal,
            next_time: 1,
            total_periods,
            first_payment_date: inputs.first_payment_date(),
            months_per_term: inputs.months_per_term().unwrap_or(0),
        })
    }

    /// Level payment per period, excluding bidrag.
    pub fn annuity(&self) -> Money {
        self.annuity
    }

    fn payment_date(&self, time: u32) -> Option<NaiveDate> {
        let first = self.first_payment_date?;
        let offset = (time - 1).checked_mul(self.months_per_term)?;
        first.checked_add_months(Months::new(offset))
    }

    fn remaining(&self) -> usize {
        (self.total_periods + 1).saturating_sub(self.next_time) as usize
    }
}

impl Iterator for Schedule {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        if self.next_time > self.total_periods {
            return None;
        }
        let time = self.next_time;
        self.next_time += 1;

        let opening = self.debt;
        let interest = opening * self.rate;
        let repayment = self.annuity - interest;
        let bidrag = opening * self.fee_rate;
        self.debt = opening - repayment;

        Some(Period {
            time,
            payment_date: self.payment_date(time),
            annuity: self.annuity,
            repayment,
            interest,
            bidrag,
            debt: self.debt,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Schedule {}

impl FusedIterator for Schedule {}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

fn non_amortizing(annuity: Money, first_interest: Money) -> RealkreditError {
    RealkreditError::NonAmortizingLoan {
        annuity,
        first_interest,
    }
}

fn out_of_range() -> RealkreditError {
    RealkreditError::invalid(
        "face_value",
        "Loan amount and rates put the schedule outside the representable range",
    )
}

/// Fail if a period closes with more debt than it opened with.
///
/// Never fires for a walk from [`Schedule::new`]: each period's interest is
/// at most the first period's, which the annuity exceeds.
fn ensure_debt_falls(
    previous_debt: Money,
    period: &Period,
    first_interest: Money,
) -> RealkreditResult<()> {
    if period.debt > previous_debt {
        return Err(non_amortizing(period.annuity, first_interest));
    }
    Ok(())
}

/// Fail if more than [`TERMINAL_DEBT_TOLERANCE`] is left after the final
/// period, which happens when repayments vanish below Decimal resolution.
fn ensure_cleared(
    final_debt: Money,
    annuity: Money,
    first_interest: Money,
) -> RealkreditResult<()> {
    if final_debt.abs() > TERMINAL_DEBT_TOLERANCE {
        return Err(non_amortizing(annuity, first_interest));
    }
    Ok(())
}

/// Walk the full schedule, collecting rounded rows and full-precision totals.
pub fn generate(inputs: &LoanInputs) -> RealkreditResult<AmortizationTable> {
    let schedule = Schedule::new(inputs)?;
    let annuity = schedule.annuity();
    let first_interest = inputs.loan_amount() * inputs.period_rate();

    let mut rows = Vec::with_capacity(schedule.len());
    let mut totals = ScheduleTotals::default();
    let mut previous_debt = inputs.loan_amount();

    for period in schedule {
        ensure_debt_falls(previous_debt, &period, first_interest)?;
        previous_debt = period.debt;
        totals.add(&period);
        rows.push(period.to_row());
    }

    ensure_cleared(totals.final_debt, annuity, first_interest)?;

    Ok(AmortizationTable {
        annuity,
        rows,
        totals,
    })
}

/// Rows with interest and bidrag reduced by a deduction at `tax_rate`.
///
/// Repayment and debt are unaffected; the billed annuity is rebuilt from
/// the after-tax components.
pub fn after_tax_rows(
    periods: impl Iterator<Item = Period>,
    tax_rate: Rate,
) -> RealkreditResult<Vec<ScheduleRow>> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
        return Err(RealkreditError::invalid(
            "tax_rate",
            "Tax rate must be between 0 and 1",
        ));
    }
    let keep = Decimal::ONE - tax_rate;

    Ok(periods
        .map(|p| {
            let interest = p.interest * keep;
            let bidrag = p.bidrag * keep;
            ScheduleRow {
                time: p.time,
                payment_date: p.payment_date,
                annuity: round_display(p.repayment + interest + bidrag, ROW_DP),
                repayment: round_display(p.repayment, ROW_DP),
                interest: round_display(interest, ROW_DP),
                debt: round_display(p.debt, ROW_DP),
                bidrag: round_display(bidrag, ROW_DP),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_inputs() -> LoanInputs {
        LoanInputs::new(dec!(99.47), dec!(1_000_000), dec!(0.05), dec!(0.0074), 30, 4).unwrap()
    }

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal, msg: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "{}: expected ~{}, got {} (diff = {})",
            msg,
            expected,
            actual,
            diff
        );
    }

    #[test]
    fn test_first_row_matches_reference() {
        let table = generate(&reference_inputs()).unwrap();
        let row = &table.rows[0];
        assert_eq!(row.time, 1);
        assert_eq!(row.annuity, dec!(18079.316));
        assert_eq!(row.repayment, dec!(3652.856));
        assert_eq!(row.interest, dec!(12566.603));
        assert_eq!(row.debt, dec!(1001675.384));
        assert_eq!(row.bidrag, dec!(1859.857));
    }

    #[test]
    fn test_second_and_last_rows() {
        let table = generate(&reference_inputs()).unwrap();
        let second = &table.rows[1];
        assert_eq!(second.annuity, dec!(18072.558));
        assert_eq!(second.repayment, dec!(3698.517));
        assert_eq!(second.interest, dec!(12520.942));
        assert_eq!(second.debt, dec!(997976.867));
        assert_eq!(second.bidrag, dec!(1853.099));

        let last = table.rows.last().unwrap();
        assert_eq!(last.time, 120);
        assert_eq!(last.annuity, dec!(16249.094));
        assert_eq!(last.repayment, dec!(16019.219));
        assert_eq!(last.interest, dec!(200.240));
        assert_eq!(last.bidrag, dec!(29.636));
        assert_close(last.debt, Decimal::ZERO, dec!(0.001), "final debt");
    }

    #[test]
    fn test_bidrag_on_opening_balance() {
        let inputs = reference_inputs();
        let first = Schedule::new(&inputs).unwrap().next().unwrap();
        assert_close(
            first.opening_debt(),
            inputs.loan_amount(),
            dec!(0.000000001),
            "opening debt",
        );
        assert_eq!(first.bidrag, inputs.loan_amount() * dec!(0.00185));
    }

    #[test]
    fn test_schedule_is_exact_size_and_restartable() {
        let schedule = Schedule::new(&reference_inputs()).unwrap();
        assert_eq!(schedule.len(), 120);

        let first_pass: Vec<Period> = schedule.clone().collect();
        let second_pass: Vec<Period> = Schedule::new(&reference_inputs()).unwrap().collect();
        assert_eq!(first_pass, second_pass);

        let mut exhausted = schedule;
        exhausted.by_ref().for_each(drop);
        assert_eq!(exhausted.len(), 0);
        assert!(exhausted.next().is_none());
    }

    #[test]
    fn test_totals_accumulate_full_precision() {
        let table = generate(&reference_inputs()).unwrap();
        let t = &table.totals;
        assert_eq!(round_display(t.total_cost, 2), dec!(2085604.07));
        assert_eq!(round_display(t.total_interest, 2), dec!(1080275.83));
        assert_eq!(round_display(t.total_bond_interest, 2), dec!(941006.82));
        assert_close(
            t.total_repayment,
            reference_inputs().loan_amount(),
            dec!(0.000001),
            "repayments sum to principal",
        );
    }

    #[test]
    fn test_zero_interest_level_repayment() {
        let inputs = LoanInputs::new(dec!(100), dec!(100_000), dec!(0), dec!(0.01), 10, 4).unwrap();
        let table = generate(&inputs).unwrap();
        assert_eq!(table.annuity, dec!(2500));
        for row in &table.rows {
            assert_eq!(row.interest, Decimal::ZERO);
            assert_eq!(row.repayment, dec!(2500));
        }
        assert_eq!(table.rows.last().unwrap().debt, Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_rate_is_non_amortizing() {
        let inputs =
            LoanInputs::new(dec!(100), dec!(1000), dec!(1000), dec!(0), 30, 4).unwrap();
        match Schedule::new(&inputs) {
            Err(RealkreditError::NonAmortizingLoan { .. }) => {}
            other => panic!("Expected NonAmortizingLoan, got {other:?}"),
        }
    }

    #[test]
    fn test_long_horizon_is_non_amortizing() {
        // 8000 years monthly: (1 + r)^n leaves the Decimal range
        let inputs =
            LoanInputs::new(dec!(100), dec!(1_000_000), dec!(0.05), dec!(0), 8000, 12).unwrap();
        match Schedule::new(&inputs) {
            Err(RealkreditError::NonAmortizingLoan {
                annuity,
                first_interest,
            }) => assert_eq!(annuity, first_interest),
            other => panic!("Expected NonAmortizingLoan, got {other:?}"),
        }
    }

    #[test]
    fn test_unrepresentable_totals_rejected() {
        let face = Decimal::from_str_exact("700000000000000000000000000").unwrap();
        let inputs = LoanInputs::new(dec!(100), face, dec!(0.05), dec!(5), 100, 12).unwrap();
        match Schedule::new(&inputs) {
            Err(RealkreditError::InvalidParameter { field, .. }) => assert_eq!(field, "face_value"),
            other => panic!("Expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_rising_debt_is_non_amortizing() {
        let first = Schedule::new(&reference_inputs()).unwrap().next().unwrap();
        let opening = first.opening_debt();
        assert!(ensure_debt_falls(opening, &first, first.interest).is_ok());

        let below_close = first.debt - dec!(0.001);
        match ensure_debt_falls(below_close, &first, first.interest) {
            Err(RealkreditError::NonAmortizingLoan { annuity, .. }) => {
                assert_eq!(annuity, first.annuity)
            }
            other => panic!("Expected NonAmortizingLoan, got {other:?}"),
        }
    }

    #[test]
    fn test_terminal_residual_is_non_amortizing() {
        let annuity = dec!(16219.459);
        let interest = dec!(12566.603);
        assert!(ensure_cleared(dec!(0.999), annuity, interest).is_ok());
        assert!(ensure_cleared(dec!(-1), annuity, interest).is_ok());
        match ensure_cleared(dec!(1.001), annuity, interest) {
            Err(RealkreditError::NonAmortizingLoan {
                annuity: a,
                first_interest,
            }) => {
                assert_eq!(a, annuity);
                assert_eq!(first_interest, interest);
            }
            other => panic!("Expected NonAmortizingLoan, got {other:?}"),
        }
        assert!(ensure_cleared(dec!(-1.5), annuity, interest).is_err());
    }

    #[test]
    fn test_payment_dates_follow_frequency() {
        let inputs = LoanInputs::new(dec!(100), dec!(10_000), dec!(0.04), dec!(0), 1, 4)
            .unwrap()
            .with_first_payment_date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
            .unwrap();
        let dates: Vec<Option<NaiveDate>> =
            Schedule::new(&inputs).unwrap().map(|p| p.payment_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 31),
                NaiveDate::from_ymd_opt(2024, 6, 30),
                NaiveDate::from_ymd_opt(2024, 9, 30),
                NaiveDate::from_ymd_opt(2024, 12, 31),
            ]
        );
    }

    #[test]
    fn test_after_tax_first_row() {
        let schedule = Schedule::new(&reference_inputs()).unwrap();
        let rows = after_tax_rows(schedule, dec!(0.26)).unwrap();
        assert_eq!(rows.len(), 120);
        assert_eq!(rows[0].interest, dec!(9299.286));
        assert_eq!(rows[0].bidrag, dec!(1376.294));
        assert_eq!(rows[0].annuity, dec!(14328.436));
        assert_eq!(rows[0].repayment, dec!(3652.856));
        assert_eq!(rows[0].debt, dec!(1001675.384));
    }

    #[test]
    fn test_after_tax_rejects_out_of_range_rate() {
        let schedule = Schedule::new(&reference_inputs()).unwrap();
        assert!(after_tax_rows(schedule.clone(), dec!(-0.1)).is_err());
        assert!(after_tax_rows(schedule, dec!(1.1)).is_err());
    }
}
