pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "loan")]
pub mod loan;

pub use error::RealkreditError;
pub use types::*;

/// Standard result type for all realkredit operations
pub type RealkreditResult<T> = Result<T, RealkreditError>;
