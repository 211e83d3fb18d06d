//! Functions that check the validity of user input.
//!
//! These functions are called after the parsing phase and execute
//! checks that are not easily done by the parser.

mod database;
mod expense;

pub use database::{validate_category_exists, validate_users_exist};
pub use expense::validate_shares;

use crate::error::ValidationError;
use crate::types::{NewSettlement, MAX_AMOUNT};

/// Names must be non-empty and printable.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.chars().any(char::is_control) {
        Err(ValidationError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Only a shallow check: one `@` with something on both sides and a dot in the domain.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// Checks done before a settlement reaches the store:
/// - both users are given (IDs start from 1)
/// - the amount is positive and not above `MAX_AMOUNT`
/// - the two users are different
pub fn validate_settlement(settlement: &NewSettlement) -> Result<(), ValidationError> {
    if settlement.owed_by <= 0 {
        Err(ValidationError::MissingField("owed_by"))
    } else if settlement.paid_to <= 0 {
        Err(ValidationError::MissingField("paid_to"))
    } else if settlement.amount <= 0 {
        Err(ValidationError::NonPositiveAmount)
    } else if settlement.amount > MAX_AMOUNT {
        Err(ValidationError::AmountTooLarge)
    } else if settlement.owed_by == settlement.paid_to {
        Err(ValidationError::SelfSettlement)
    } else {
        Ok(())
    }
}
