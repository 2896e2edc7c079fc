//! Validated loan terms.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RealkreditError;
use crate::types::{Money, Price, Rate};
use crate::RealkreditResult;

const MONTHS_PER_YEAR: u32 = 12;

/// Upper bound on `maturity * n_terms`.
pub const MAX_PERIODS: u32 = 100_000;

fn default_maturity() -> u32 {
    30
}

fn default_n_terms() -> u32 {
    4
}

/// Terms of a fixed-rate mortgage-bond loan.
///
/// Fields are private so that every value in circulation has passed
/// validation. Deserialization goes through the same check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLoanInputs")]
pub struct LoanInputs {
    price: Price,
    face_value: Money,
    interest: Rate,
    bidrag: Rate,
    maturity: u32,
    n_terms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_payment_date: Option<NaiveDate>,
    #[serde(skip_serializing)]
    loan_amount: Money,
}

/// Unvalidated wire shape of [`LoanInputs`].
#[derive(Debug, Clone, Deserialize)]
struct RawLoanInputs {
    /// Bond price in hundreds, e.g. 99.47
    price: Price,
    /// Cash the borrower wants to raise
    face_value: Money,
    /// Nominal annual coupon rate (0.05 = 5%)
    interest: Rate,
    /// Annual servicing-fee rate charged on outstanding debt
    #[serde(default)]
    bidrag: Rate,
    /// Term in years
    #[serde(default = "default_maturity")]
    maturity: u32,
    /// Payments per year
    #[serde(default = "default_n_terms")]
    n_terms: u32,
    #[serde(default)]
    first_payment_date: Option<NaiveDate>,
}

impl TryFrom<RawLoanInputs> for LoanInputs {
    type Error = RealkreditError;

    fn try_from(raw: RawLoanInputs) -> RealkreditResult<Self> {
        let inputs = LoanInputs::new(
            raw.price,
            raw.face_value,
            raw.interest,
            raw.bidrag,
            raw.maturity,
            raw.n_terms,
        )?;
        match raw.first_payment_date {
            Some(date) => inputs.with_first_payment_date(date),
            None => Ok(inputs),
        }
    }
}

impl LoanInputs {
    pub fn new(
        price: Price,
        face_value: Money,
        interest: Rate,
        bidrag: Rate,
        maturity: u32,
        n_terms: u32,
    ) -> RealkreditResult<Self> {
        let mut inputs = LoanInputs {
            price,
            face_value,
            interest,
            bidrag,
            maturity,
            n_terms,
            first_payment_date: None,
            loan_amount: Decimal::ZERO,
        };
        inputs.loan_amount = inputs.validate()?;
        Ok(inputs)
    }

    /// Anchor the schedule on a calendar date for period 1.
    ///
    /// Only frequencies that divide a year into whole months can be dated.
    pub fn with_first_payment_date(mut self, date: NaiveDate) -> RealkreditResult<Self> {
        if MONTHS_PER_YEAR % self.n_terms != 0 {
            return Err(RealkreditError::invalid(
                "n_terms",
                format!(
                    "Payment dates require n_terms to divide 12, got {}",
                    self.n_terms
                ),
            ));
        }
        self.first_payment_date = Some(date);
        Ok(self)
    }

    /// Check every term and return the grossed-up loan amount.
    fn validate(&self) -> RealkreditResult<Money> {
        if self.price <= Decimal::ZERO {
            return Err(RealkreditError::invalid("price", "Price must be positive"));
        }
        if self.face_value <= Decimal::ZERO {
            return Err(RealkreditError::invalid(
                "face_value",
                "Face value must be positive",
            ));
        }
        let grossed = self.face_value.checked_mul(dec!(100)).ok_or_else(|| {
            RealkreditError::invalid("face_value", "Face value is too large to gross up")
        })?;
        let loan_amount = match grossed.checked_div(self.price) {
            Some(amount) if !amount.is_zero() => amount,
            _ => {
                return Err(RealkreditError::invalid(
                    "price",
                    format!(
                        "Price {} puts the loan amount outside the representable range",
                        self.price
                    ),
                ));
            }
        };
        if self.interest < Decimal::ZERO {
            return Err(RealkreditError::invalid(
                "interest",
                "Interest rate cannot be negative",
            ));
        }
        if self.bidrag < Decimal::ZERO {
            return Err(RealkreditError::invalid(
                "bidrag",
                "Bidrag rate cannot be negative",
            ));
        }
        if self.maturity == 0 {
            return Err(RealkreditError::invalid(
                "maturity",
                "Maturity must be at least one year",
            ));
        }
        if self.n_terms == 0 {
            return Err(RealkreditError::invalid(
                "n_terms",
                "At least one payment per year is required",
            ));
        }
        match self.maturity.checked_mul(self.n_terms) {
            Some(n) if n <= MAX_PERIODS => {}
            _ => {
                return Err(RealkreditError::invalid(
                    "maturity",
                    format!("maturity * n_terms must not exceed {MAX_PERIODS} periods"),
                ));
            }
        }
        Ok(loan_amount)
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn face_value(&self) -> Money {
        self.face_value
    }

    pub fn interest(&self) -> Rate {
        self.interest
    }

    pub fn bidrag(&self) -> Rate {
        self.bidrag
    }

    pub fn maturity(&self) -> u32 {
        self.maturity
    }

    pub fn n_terms(&self) -> u32 {
        self.n_terms
    }

    pub fn first_payment_date(&self) -> Option<NaiveDate> {
        self.first_payment_date
    }

    /// Total number of payment periods.
    pub fn total_periods(&self) -> u32 {
        // Bounded by MAX_PERIODS in validate.
        self.maturity * self.n_terms
    }

    /// Bond debt owed: face value grossed up by the issuance price.
    pub fn loan_amount(&self) -> Money {
        self.loan_amount
    }

    pub fn period_rate(&self) -> Rate {
        self.interest / Decimal::from(self.n_terms)
    }

    pub fn period_bidrag_rate(&self) -> Rate {
        self.bidrag / Decimal::from(self.n_terms)
    }

    /// Months between payments, if the frequency is whole-month.
    pub fn months_per_term(&self) -> Option<u32> {
        (MONTHS_PER_YEAR % self.n_terms == 0).then(|| MONTHS_PER_YEAR / self.n_terms)
    }
}
