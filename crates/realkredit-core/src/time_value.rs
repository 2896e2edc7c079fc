use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::RealkreditError;
use crate::types::{Money, Rate};
use crate::RealkreditResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const RATE_EPSILON: Decimal = dec!(0.000000000000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Internal Rate of Return per period using Newton-Raphson.
///
/// Discount factors are built by repeated multiplication rather than
/// `powd` so that long schedules keep full decimal precision.
pub fn irr(cash_flows: &[Money], guess: Rate) -> RealkreditResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(RealkreditError::invalid(
            "cash_flows",
            "IRR requires at least 2 cash flows",
        ));
    }

    let mut rate = guess;
    let mut npv_val = Decimal::ZERO;

    for i in 0..MAX_IRR_ITERATIONS {
        let one_plus_r = Decimal::ONE + rate;
        if one_plus_r <= Decimal::ZERO {
            return Err(diverged(i, npv_val));
        }

        npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let mut discount = Decimal::ONE;

        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                match discount.checked_mul(one_plus_r) {
                    Some(d) if !d.is_zero() => discount = d,
                    Some(_) => return Err(diverged(i, npv_val)),
                    // Remaining flows discount to nothing at this precision.
                    None => break,
                }
                if let Some(denom) = discount.checked_mul(one_plus_r) {
                    let slope = (Decimal::from(t as u64) * cf)
                        .checked_div(denom)
                        .ok_or_else(|| diverged(i, npv_val))?;
                    dnpv -= slope;
                }
            }
            let pv = cf
                .checked_div(discount)
                .ok_or_else(|| diverged(i, npv_val))?;
            npv_val = npv_val
                .checked_add(pv)
                .ok_or_else(|| diverged(i, npv_val))?;
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(diverged(i, npv_val));
        }

        let step = npv_val / dnpv;
        rate -= step;

        if step.abs() < RATE_EPSILON {
            return Ok(rate);
        }

        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(diverged(MAX_IRR_ITERATIONS, npv_val))
}

fn diverged(iterations: u32, last_delta: Decimal) -> RealkreditError {
    RealkreditError::ConvergenceFailure {
        function: "IRR".into(),
        iterations,
        last_delta,
    }
}

/// Level payment that amortizes `principal` over `nper` periods at `rate`
/// per period: `P * r / (1 - (1 + r)^-n)`.
///
/// A zero rate divides the principal evenly. When `(1 + r)^n` exceeds the
/// Decimal range, `(1 + r)^-n` is below Decimal resolution and the payment
/// is exactly `P * r`, i.e. interest-only.
pub fn level_payment(principal: Money, rate: Rate, nper: u32) -> RealkreditResult<Money> {
    if nper == 0 {
        return Err(RealkreditError::invalid(
            "nper",
            "Number of periods must be > 0",
        ));
    }
    if rate < Decimal::ZERO {
        return Err(RealkreditError::invalid(
            "rate",
            "Periodic rate must be non-negative",
        ));
    }

    let n = Decimal::from(nper);
    if rate.is_zero() {
        return Ok(principal / n);
    }

    let interest_only = principal.checked_mul(rate).ok_or_else(|| {
        RealkreditError::invalid("principal", "Principal * rate exceeds the Decimal range")
    })?;
    let factor = match (Decimal::ONE + rate).checked_powu(u64::from(nper)) {
        Some(f) => f,
        None => return Ok(interest_only),
    };

    let annuity_factor = Decimal::ONE - Decimal::ONE / factor;
    if annuity_factor.is_zero() {
        // Rate below Decimal resolution.
        return Ok(principal / n);
    }

    interest_only.checked_div(annuity_factor).ok_or_else(|| {
        RealkreditError::invalid("principal", "Level payment exceeds the Decimal range")
    })
}

/// Convert a per-period rate into its effective annual equivalent.
pub fn effective_annual(period_rate: Rate, periods_per_year: u32) -> Option<Rate> {
    (Decimal::ONE + period_rate)
        .checked_powu(u64::from(periods_per_year))
        .map(|f| f - Decimal::ONE)
}
