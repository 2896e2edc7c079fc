use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealkreditError {
    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Non-amortizing loan: annuity {annuity} does not exceed first-period interest {first_interest}")]
    NonAmortizingLoan {
        annuity: Decimal,
        first_interest: Decimal,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RealkreditError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        RealkreditError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RealkreditError {
    fn from(e: serde_json::Error) -> Self {
        RealkreditError::SerializationError(e.to_string())
    }
}
