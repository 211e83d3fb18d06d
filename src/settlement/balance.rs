//! Net balances per user, recomputed from the raw ledger records on every call.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::ConsistencyError;
use crate::types::{Amount, Balance, ExpenseId, SettledDebt, SharedSplit, User, UserId};

/// Expense, ower, payer and amount.
pub type SplitKey = (ExpenseId, UserId, UserId, Amount);

/// Pairing of settlements with the splits they close.
///
/// A settlement closes a split only when expense, ower, payer and amount are all
/// equal. Each settlement closes at most one split and vice versa. Settlements
/// that close nothing are transfers between the two users.
pub struct Matching<'a> {
    closed: Vec<bool>,
    transfers: Vec<&'a SettledDebt>,
}

impl<'a> Matching<'a> {
    pub fn is_closed(&self, split_index: usize) -> bool {
        self.closed.get(split_index).copied().unwrap_or(false)
    }

    pub fn closed_count(&self) -> usize {
        self.closed.iter().filter(|&&c| c).count()
    }

    pub fn transfers(&self) -> &[&'a SettledDebt] {
        &self.transfers
    }

    /// True when some split with this key is still open.
    pub fn has_open(&self, splits: &[SharedSplit], key: SplitKey) -> bool {
        splits
            .iter()
            .enumerate()
            .any(|(index, split)| !self.is_closed(index) && split_key(split) == key)
    }

    /// What `owed_by` still owes `paid_to` on their own: the open splits between
    /// the two, less the transfers already made from one to the other.
    pub fn direct_debt(&self, splits: &[SharedSplit], owed_by: UserId, paid_to: UserId) -> Amount {
        let open: Amount = splits
            .iter()
            .enumerate()
            .filter(|(index, split)| {
                !self.is_closed(*index) && split.owed_by == owed_by && split.paid_by == paid_to
            })
            .map(|(_, split)| split.amount)
            .sum();

        let transferred: Amount = self
            .transfers
            .iter()
            .map(|t| {
                if t.owed_by == owed_by && t.paid_to == paid_to {
                    t.amount
                } else if t.owed_by == paid_to && t.paid_to == owed_by {
                    -t.amount
                } else {
                    0
                }
            })
            .sum();

        open - transferred
    }
}

pub fn match_settlements<'a>(
    splits: &[SharedSplit],
    settlements: &'a [SettledDebt],
) -> Matching<'a> {
    // Indices are pushed in reverse so that `pop` hands out the earliest split first.
    let mut open: HashMap<SplitKey, Vec<usize>> = HashMap::new();
    for (index, split) in splits.iter().enumerate().rev() {
        open.entry(split_key(split)).or_default().push(index);
    }

    let mut closed = vec![false; splits.len()];
    let mut transfers = vec![];

    for settlement in settlements {
        let index = settlement.expense_id.and_then(|expense_id| {
            open.get_mut(&(
                expense_id,
                settlement.owed_by,
                settlement.paid_to,
                settlement.amount,
            ))
            .and_then(|indices| indices.pop())
        });

        match index {
            Some(index) => closed[index] = true,
            None => transfers.push(settlement),
        }
    }

    Matching { closed, transfers }
}

fn split_key(split: &SharedSplit) -> SplitKey {
    (split.expense_id, split.owed_by, split.paid_by, split.amount)
}

/// Compute the balance of every user.
///
/// Open splits credit the payer and debit the ower; closed splits count for
/// nobody. Transfers credit the user who paid and debit the one who received.
/// Every user in `users` gets an entry, zero-filled when it has no activity.
pub fn compute_balances(
    users: &[User],
    splits: &[SharedSplit],
    settlements: &[SettledDebt],
) -> Result<BTreeMap<UserId, Balance>, ConsistencyError> {
    let mut balances: BTreeMap<_, _> = users.iter().map(|u| (u.id, Balance::zero(u.id))).collect();

    let matching = match_settlements(splits, settlements);

    for (index, split) in splits.iter().enumerate() {
        for user_id in [split.paid_by, split.owed_by] {
            if !balances.contains_key(&user_id) {
                return Err(ConsistencyError::OrphanedSplit {
                    expense_id: split.expense_id,
                    user_id,
                });
            }
        }

        if matching.is_closed(index) {
            continue;
        }

        add_paid(&mut balances, split.paid_by, split.amount);
        add_owed(&mut balances, split.owed_by, split.amount);
    }

    for transfer in matching.transfers() {
        for user_id in [transfer.owed_by, transfer.paid_to] {
            if !balances.contains_key(&user_id) {
                return Err(ConsistencyError::OrphanedSettlement {
                    settlement_id: transfer.id,
                    user_id,
                });
            }
        }

        add_paid(&mut balances, transfer.owed_by, transfer.amount);
        add_owed(&mut balances, transfer.paid_to, transfer.amount);
    }

    for balance in balances.values_mut() {
        balance.net_balance = balance.total_paid - balance.total_owed;
    }

    debug!(
        "Computed {} balances from {} splits ({} closed) and {} transfers",
        balances.len(),
        splits.len(),
        matching.closed_count(),
        matching.transfers().len()
    );

    Ok(balances)
}

fn add_paid(balances: &mut BTreeMap<UserId, Balance>, user_id: UserId, amount: Amount) {
    if let Some(balance) = balances.get_mut(&user_id) {
        balance.total_paid += amount;
    }
}

fn add_owed(balances: &mut BTreeMap<UserId, Balance>, user_id: UserId, amount: Amount) {
    if let Some(balance) = balances.get_mut(&user_id) {
        balance.total_owed += amount;
    }
}
