use thiserror::Error;

use crate::formatter::format_amount;
use crate::types::{Amount, ExpenseId, UserId, MAX_AMOUNT};

/// Invalid user input, rejected before (or by) the store and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid amount `{0}`: expected a positive number with at most two decimals")]
    InvalidAmount(String),

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("amount cannot exceed {}", display_amount(&MAX_AMOUNT))]
    AmountTooLarge,

    #[error("invalid share `{0}`: expected `user_id=amount`")]
    InvalidShare(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("a user cannot settle a debt with themselves")]
    SelfSettlement,

    #[error("invalid name `{0}`: names cannot be empty or contain control characters")]
    InvalidName(String),

    #[error("invalid email `{0}`")]
    InvalidEmail(String),

    #[error("email `{0}` is already in use")]
    EmailInUse(String),

    #[error("wrong email or password")]
    InvalidCredentials,

    #[error("user {0} does not exist")]
    UnknownUser(UserId),

    #[error("expense {0} does not exist")]
    UnknownExpense(ExpenseId),

    #[error("category `{0}` does not exist")]
    UnknownCategory(String),

    #[error("category `{0}` is used by at least one expense and cannot be deleted")]
    CategoryInUse(String),

    #[error("a shared expense needs at least one participant besides the payer")]
    NoParticipants,

    #[error("user {0} appears more than once among the participants")]
    DuplicateParticipant(UserId),

    #[error(
        "the shares add up to {} but the expense amount is {}",
        display_amount(.shares),
        display_amount(.amount)
    )]
    SharesMismatch { shares: Amount, amount: Amount },

    #[error("this settlement has already been recorded")]
    DuplicateSettlement,

    #[error(
        "user {owed_by} does not owe {} to user {paid_to}",
        display_amount(.amount)
    )]
    ExceedsDebt {
        owed_by: UserId,
        paid_to: UserId,
        amount: Amount,
    },

    #[error("this operation requires a session")]
    SessionRequired,
}

/// The ledger contradicts itself. Surfaced, never repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error(
        "ledger is unbalanced: total credit is {} but total debt is {}",
        display_amount(.credit),
        display_amount(.debt)
    )]
    UnbalancedLedger { credit: Amount, debt: Amount },

    #[error("split of expense {expense_id} refers to unknown user {user_id}")]
    OrphanedSplit { expense_id: ExpenseId, user_id: UserId },

    #[error("settlement {settlement_id} refers to unknown user {user_id}")]
    OrphanedSettlement { settlement_id: i64, user_id: UserId },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("{message}: {cause:#}")]
    Query {
        message: String,
        cause: anyhow::Error,
    },

    #[error("concurrent modification detected: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error(transparent)]
    Inconsistent(#[from] ConsistencyError),
}

/// Error type of every ledger operation.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("inconsistent ledger: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("storage failure: {0}")]
    Store(DatabaseError),
}

fn display_amount(amount: &Amount) -> String {
    format_amount(*amount)
}

impl DatabaseError {
    pub fn new<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        DatabaseError::Query {
            message: message.as_ref().to_string(),
            cause,
        }
    }

    pub fn concurrency<T: AsRef<str>>(message: T) -> Self {
        DatabaseError::Concurrency(message.as_ref().to_string())
    }
}

impl From<DatabaseError> for LedgerError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Rejected(e) => LedgerError::Validation(e),
            DatabaseError::Inconsistent(e) => LedgerError::Consistency(e),
            e => LedgerError::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_lifted() {
        let e: LedgerError = DatabaseError::from(ValidationError::DuplicateSettlement).into();
        assert!(matches!(
            e,
            LedgerError::Validation(ValidationError::DuplicateSettlement)
        ));

        let e: LedgerError =
            DatabaseError::from(ConsistencyError::UnbalancedLedger { credit: 1, debt: 2 }).into();
        assert!(matches!(e, LedgerError::Consistency(_)));

        let e: LedgerError = DatabaseError::concurrency("the user was not found").into();
        assert!(matches!(e, LedgerError::Store(_)));
    }

    #[test]
    fn test_messages() {
        let e = DatabaseError::new("cannot get users", anyhow::anyhow!("disk I/O error"));
        assert_eq!(e.to_string(), "cannot get users: disk I/O error");

        assert_eq!(
            ValidationError::ExceedsDebt {
                owed_by: 2,
                paid_to: 1,
                amount: 3000
            }
            .to_string(),
            "user 2 does not owe 30.00 to user 1"
        );
    }
}
