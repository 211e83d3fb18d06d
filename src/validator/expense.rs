//! Functions that check the validity of the shares of a shared expense.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{Amount, Shares, UserId, MAX_AMOUNT};

/// Some sanity checks on the way an expense is split.
///
/// List of checks:
/// - the amount is positive and not above `MAX_AMOUNT`
/// - there is at least one participant besides the payer
/// - no participant appears more than once
/// - exact shares are positive and add up to the expense amount
pub fn validate_shares(amount: Amount, payer: UserId, shares: &Shares) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount);
    }
    if amount > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge);
    }

    match shares {
        Shares::Equal(participants) => {
            no_duplicate_participants(participants.iter().copied())?;
            at_least_one_other_participant(participants.iter().copied(), payer)
        }
        Shares::Exact(shares) => {
            no_duplicate_participants(shares.iter().map(|(user_id, _)| *user_id))?;
            at_least_one_other_participant(shares.iter().map(|(user_id, _)| *user_id), payer)?;
            shares_add_up(amount, shares)
        }
    }
}

fn at_least_one_other_participant(
    mut participants: impl Iterator<Item = UserId>,
    payer: UserId,
) -> Result<(), ValidationError> {
    if participants.any(|p| p != payer) {
        Ok(())
    } else {
        Err(ValidationError::NoParticipants)
    }
}

/// We use the fact that a HashSet returns false upon insertion if the element
/// is already present.
fn no_duplicate_participants(
    participants: impl Iterator<Item = UserId>,
) -> Result<(), ValidationError> {
    let mut uniq = HashSet::new();
    for participant in participants {
        if !uniq.insert(participant) {
            return Err(ValidationError::DuplicateParticipant(participant));
        }
    }
    Ok(())
}

fn shares_add_up(amount: Amount, shares: &[(UserId, Amount)]) -> Result<(), ValidationError> {
    if shares.iter().any(|(_, share)| *share <= 0) {
        return Err(ValidationError::NonPositiveAmount);
    }
    if shares.iter().any(|(_, share)| *share > MAX_AMOUNT) {
        return Err(ValidationError::AmountTooLarge);
    }

    let total: Amount = shares.iter().map(|(_, share)| share).sum();
    if total != amount {
        Err(ValidationError::SharesMismatch {
            shares: total,
            amount,
        })
    } else {
        Ok(())
    }
}
