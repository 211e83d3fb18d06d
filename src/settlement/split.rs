//! Turn a shared expense into the debts of its participants.

use log::debug;

use crate::error::ValidationError;
use crate::types::{Amount, NewSplit, Shares, UserId};
use crate::validator::validate_shares;

/// Build the split rows of a shared expense paid by `payer`.
///
/// The payer's own share is never stored: nobody owes money to themselves.
/// With equal shares each participant owes `amount / n`; the cents left over go
/// to the payer when the payer takes part, otherwise to the first participant,
/// so that the shares always add up to the expense amount.
pub fn build_splits(
    amount: Amount,
    payer: UserId,
    shares: &Shares,
) -> Result<Vec<NewSplit>, ValidationError> {
    validate_shares(amount, payer, shares)?;

    let shares = match shares {
        Shares::Equal(participants) => equal_shares(amount, payer, participants),
        Shares::Exact(shares) => shares.clone(),
    };

    let splits: Vec<_> = shares
        .into_iter()
        .filter(|&(user_id, share)| user_id != payer && share > 0)
        .map(|(user_id, share)| NewSplit::new(user_id, share))
        .collect();

    if splits.is_empty() {
        // Only possible when the amount has fewer cents than there are participants.
        return Err(ValidationError::NoParticipants);
    }

    debug!("Split {amount} cents paid by {payer} into {} debts", splits.len());
    Ok(splits)
}

fn equal_shares(amount: Amount, payer: UserId, participants: &[UserId]) -> Vec<(UserId, Amount)> {
    let n = participants.len() as Amount;
    let quota = amount / n;
    let remainder = amount % n;

    let designated = if participants.contains(&payer) {
        Some(payer)
    } else {
        participants.first().copied()
    };

    participants
        .iter()
        .map(|&user_id| {
            if Some(user_id) == designated {
                (user_id, quota + remainder)
            } else {
                (user_id, quota)
            }
        })
        .collect()
}
