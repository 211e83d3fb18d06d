//! Record settlements and track which shared expenses they close.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::{DatabaseError, LedgerError, ValidationError};
use crate::types::{
    ExpenseId, ExpenseStatus, LedgerSnapshot, NewSettlement, Session, SettledDebt, SharedSplit,
};
use crate::validator::validate_settlement;

use super::balance::{compute_balances, match_settlements};

/// Commit a settlement.
///
/// The checks and the insert happen inside the same write transaction, with
/// the store locked for the whole time, so two requests for the same debt
/// cannot both succeed:
/// - a settlement tied to an expense is rejected when an identical one exists
/// - one that closes an open split is rejected when transfers between the two
///   users already paid for it
/// - any other settlement is a transfer, rejected when the payer does not owe
///   that much anymore, or the receiver is not owed that much
pub async fn record_settlement<D: Database>(
    database: &Arc<Mutex<D>>,
    session: &Session,
    settlement: NewSettlement,
) -> Result<SettledDebt, LedgerError> {
    validate_settlement(&settlement)?;

    let result = database
        .lock()
        .await
        .save_settlement(&settlement, |snapshot| {
            check_settlement(snapshot, &settlement)
        });

    match result {
        Ok(saved) => {
            info!(
                "{} recorded settlement {}: user {} paid {} cents to user {}",
                session.name, saved.id, saved.owed_by, saved.amount, saved.paid_to
            );
            Ok(saved)
        }
        Err(e) => {
            warn!("Settlement {:?} rejected: {e}", settlement);
            Err(e.into())
        }
    }
}

fn check_settlement(
    snapshot: &LedgerSnapshot,
    settlement: &NewSettlement,
) -> Result<(), DatabaseError> {
    for user_id in [settlement.owed_by, settlement.paid_to] {
        if !snapshot.users.iter().any(|u| u.id == user_id) {
            return Err(ValidationError::UnknownUser(user_id).into());
        }
    }

    let matching = match_settlements(&snapshot.splits, &snapshot.settlements);
    let exceeds_debt = || ValidationError::ExceedsDebt {
        owed_by: settlement.owed_by,
        paid_to: settlement.paid_to,
        amount: settlement.amount,
    };

    if let Some(expense_id) = settlement.expense_id {
        if !snapshot.expense_ids.contains(&expense_id) {
            return Err(ValidationError::UnknownExpense(expense_id).into());
        }
        if snapshot.settlements.iter().any(|s| is_same_settlement(s, settlement)) {
            return Err(ValidationError::DuplicateSettlement.into());
        }

        let key = (
            expense_id,
            settlement.owed_by,
            settlement.paid_to,
            settlement.amount,
        );
        if matching.has_open(&snapshot.splits, key) {
            let debt =
                matching.direct_debt(&snapshot.splits, settlement.owed_by, settlement.paid_to);
            debug!(
                "Settlement closes a split of expense {expense_id}: user {} still owes {debt} to user {}",
                settlement.owed_by, settlement.paid_to
            );
            return if debt < settlement.amount {
                Err(exceeds_debt().into())
            } else {
                Ok(())
            };
        }
    }

    let balances = compute_balances(&snapshot.users, &snapshot.splits, &snapshot.settlements)?;
    let owed = balances
        .get(&settlement.owed_by)
        .map_or(0, |b| -b.net_balance);
    let due = balances
        .get(&settlement.paid_to)
        .map_or(0, |b| b.net_balance);
    debug!(
        "Transfer check: user {} owes {owed}, user {} is due {due}",
        settlement.owed_by, settlement.paid_to
    );

    if owed < settlement.amount || due < settlement.amount {
        Err(exceeds_debt().into())
    } else {
        Ok(())
    }
}

fn is_same_settlement(saved: &SettledDebt, settlement: &NewSettlement) -> bool {
    saved.expense_id == settlement.expense_id
        && saved.owed_by == settlement.owed_by
        && saved.paid_to == settlement.paid_to
        && saved.amount == settlement.amount
}

/// True iff the expense has splits and every one of them is closed by a settlement.
pub fn is_fully_settled(splits: &[SharedSplit], settlements: &[SettledDebt]) -> bool {
    expense_status(splits, settlements) == Some(ExpenseStatus::FullySettled)
}

/// Settlement state of one shared expense, given its splits.
///
/// Returns `None` when there are no splits, i.e. the expense is personal.
pub fn expense_status(splits: &[SharedSplit], settlements: &[SettledDebt]) -> Option<ExpenseStatus> {
    if splits.is_empty() {
        return None;
    }

    let closed = match_settlements(splits, settlements).closed_count();
    let status = if closed == 0 {
        ExpenseStatus::Open
    } else if closed < splits.len() {
        ExpenseStatus::PartiallySettled
    } else {
        ExpenseStatus::FullySettled
    };
    Some(status)
}

/// IDs of all fully settled expenses, in ascending order.
pub fn fully_settled_expenses(splits: &[SharedSplit], settlements: &[SettledDebt]) -> Vec<ExpenseId> {
    let mut per_expense: BTreeMap<ExpenseId, Vec<SharedSplit>> = BTreeMap::new();
    for split in splits {
        per_expense
            .entry(split.expense_id)
            .or_default()
            .push(split.clone());
    }

    per_expense
        .into_iter()
        .filter(|(_, splits)| is_fully_settled(splits, settlements))
        .map(|(id, _)| id)
        .collect()
}
