//! Parsing of untrusted form input into typed field values.
//!
//! The ledger engine and post service assume well-typed input; everything
//! stringly-typed is converted (and rejected) here, at the boundary.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors for malformed field input.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },

    #[error("invalid amount '{input}': expected a decimal number")]
    InvalidAmount { input: String },

    #[error("amount '{input}' is out of range")]
    AmountOutOfRange { input: String },
}

/// Parse an ISO calendar date (`YYYY-MM-DD`).
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        input: input.to_string(),
    })
}

/// Convert a major-unit amount string into minor units (cents).
///
/// The value is read as a decimal number and rounded to the nearest cent,
/// so `"79.475"` becomes `7948` and `"-0.5"` becomes `-50`.
pub fn parse_amount(input: &str) -> Result<i64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("amount"));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidAmount {
            input: input.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidAmount {
            input: input.to_string(),
        });
    }
    let cents = (value * 100.0).round();
    // Beyond 2^63 cents the value no longer fits the storage type (and
    // lost integer precision long before).
    if cents < i64::MIN as f64 || cents > i64::MAX as f64 {
        return Err(ValidationError::AmountOutOfRange {
            input: input.to_string(),
        });
    }
    Ok(cents as i64)
}

/// Require a non-blank text field, trimming surrounding whitespace.
pub fn require_text(field: &'static str, input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}
