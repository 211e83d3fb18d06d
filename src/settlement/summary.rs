//! Spending totals of a single user.

use std::collections::{BTreeSet, HashMap};

use crate::types::{
    Amount, Expense, SettledDebt, SharedSplit, SpendingSummary, SpendingTransaction,
    TransactionKind, User, UserId,
};

use super::balance::match_settlements;
use super::recorder::is_fully_settled;

pub fn spending_summary(
    user_id: UserId,
    users: &[User],
    expenses: &[Expense],
    splits: &[SharedSplit],
    settlements: &[SettledDebt],
) -> SpendingSummary {
    let own_expenses: Vec<_> = expenses.iter().filter(|e| e.payer == user_id).collect();

    let total_paid: Amount = own_expenses.iter().map(|e| e.amount).sum();
    let total_shared_paid: Amount = splits
        .iter()
        .filter(|s| s.paid_by == user_id)
        .map(|s| s.amount)
        .sum();
    let total_reimbursed: Amount = settlements
        .iter()
        .filter(|s| s.paid_to == user_id)
        .map(|s| s.amount)
        .sum();

    let matching = match_settlements(splits, settlements);
    let total_owed: Amount = splits
        .iter()
        .enumerate()
        .filter(|(index, s)| s.owed_by == user_id && !matching.is_closed(*index))
        .map(|(_, s)| s.amount)
        .sum();

    let mut per_category: HashMap<&str, Amount> = HashMap::new();
    for expense in &own_expenses {
        *per_category.entry(expense.category.as_str()).or_default() += expense.amount;
    }
    // Ties go to the alphabetically first category.
    let top_category = per_category
        .into_iter()
        .max_by(|(n1, a1), (n2, a2)| a1.cmp(a2).then_with(|| n2.cmp(n1)))
        .map(|(name, _)| name.to_string());

    SpendingSummary {
        user_id,
        total_paid,
        total_shared_paid,
        total_reimbursed,
        total_owed,
        net_spent: total_paid - total_reimbursed,
        top_category,
        transactions: transactions(user_id, users, expenses, splits, settlements),
    }
}

fn transactions(
    user_id: UserId,
    users: &[User],
    expenses: &[Expense],
    splits: &[SharedSplit],
    settlements: &[SettledDebt],
) -> Vec<SpendingTransaction> {
    let names: HashMap<UserId, &str> = users.iter().map(|u| (u.id, u.name.as_str())).collect();
    let mut per_expense: HashMap<_, Vec<SharedSplit>> = HashMap::new();
    for split in splits {
        per_expense
            .entry(split.expense_id)
            .or_default()
            .push(split.clone());
    }

    let mut transactions: Vec<_> = expenses
        .iter()
        .filter_map(|expense| {
            let splits = per_expense
                .get(&expense.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let involved = expense.payer == user_id
                || splits
                    .iter()
                    .any(|s| s.owed_by == user_id || s.paid_by == user_id);
            if !involved {
                return None;
            }

            let shared_with: BTreeSet<_> = splits
                .iter()
                .filter_map(|s| names.get(&s.owed_by).map(|n| n.to_string()))
                .collect();
            Some(SpendingTransaction {
                expense_id: expense.id,
                amount: expense.amount,
                description: expense.description.clone(),
                category: expense.category.clone(),
                created_at: expense.created_at,
                kind: if splits.is_empty() {
                    TransactionKind::Personal
                } else {
                    TransactionKind::Shared
                },
                shared_with: shared_with.into_iter().collect(),
                settled: is_fully_settled(splits, settlements),
            })
        })
        .collect();

    transactions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.expense_id.cmp(&a.expense_id))
    });
    transactions
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::settlement::test_utils::{make_users, settlement};

    fn expense(id: i64, payer: UserId, amount: Amount, category: &str) -> Expense {
        Expense {
            id,
            amount,
            category: category.to_string(),
            description: None,
            payer,
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn test_spending_summary() {
        let expenses = vec![
            expense(1, 1, 3000, "food"),
            expense(2, 1, 1000, "travel"),
            expense(3, 1, 2000, "travel"),
            expense(4, 2, 9000, "rent"),
        ];
        let splits = vec![
            SharedSplit::new(1, 1, 2, 1500),
            SharedSplit::new(4, 2, 1, 4500),
        ];
        let settlements = vec![settlement(1, Some(1), 2, 1, 1500)];
        let users = make_users(2);

        let summary = spending_summary(1, &users, &expenses, &splits, &settlements);

        assert_eq!(summary.total_paid, 6000);
        assert_eq!(summary.total_shared_paid, 1500);
        assert_eq!(summary.total_reimbursed, 1500);
        assert_eq!(summary.total_owed, 4500);
        assert_eq!(summary.net_spent, 4500);
        assert_eq!(summary.top_category, Some("food".to_string()));

        let summary = spending_summary(2, &users, &expenses, &splits, &settlements);
        assert_eq!(summary.total_owed, 0);
        assert_eq!(summary.top_category, Some("rent".to_string()));
    }

    #[test]
    fn test_transactions() {
        let mut expenses = vec![
            expense(1, 1, 3000, "food"),
            expense(2, 2, 900, "taxi"),
            expense(3, 3, 600, "rent"),
            expense(4, 3, 400, "books"),
        ];
        for (day, expense) in expenses.iter_mut().enumerate() {
            expense.created_at = DateTime::<Utc>::MIN_UTC + chrono::Duration::days(day as i64);
        }
        let splits = vec![
            SharedSplit::new(1, 1, 2, 1000),
            SharedSplit::new(1, 1, 3, 1000),
            SharedSplit::new(2, 2, 1, 300),
            SharedSplit::new(2, 2, 3, 300),
            SharedSplit::new(3, 3, 2, 600),
        ];
        let settlements = vec![settlement(1, Some(2), 1, 2, 300)];

        let summary = spending_summary(1, &make_users(3), &expenses, &splits, &settlements);

        let ids: Vec<_> = summary.transactions.iter().map(|t| t.expense_id).collect();
        assert_eq!(ids, vec![2, 1]);

        let taxi = &summary.transactions[0];
        assert_eq!(taxi.kind, TransactionKind::Shared);
        assert_eq!(taxi.shared_with, vec!["user1", "user3"]);
        assert!(!taxi.settled);

        let food = &summary.transactions[1];
        assert_eq!(food.shared_with, vec!["user2", "user3"]);
        assert!(!food.settled);

        let summary = spending_summary(3, &make_users(3), &expenses, &splits, &settlements);
        let kinds: Vec<_> = summary
            .transactions
            .iter()
            .map(|t| (t.expense_id, t.kind, t.settled))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (4, TransactionKind::Personal, false),
                (3, TransactionKind::Shared, false),
                (2, TransactionKind::Shared, false),
                (1, TransactionKind::Shared, false),
            ]
        );

        let settlements = vec![settlement(1, Some(3), 2, 3, 600)];
        let summary = spending_summary(2, &make_users(3), &expenses, &splits, &settlements);
        let rent = &summary.transactions[0];
        assert_eq!(rent.expense_id, 3);
        assert!(rent.settled);
    }

    #[test]
    fn test_idle_user() {
        let summary = spending_summary(5, &make_users(5), &[], &[], &[]);
        assert_eq!(summary.total_paid, 0);
        assert_eq!(summary.top_category, None);
        assert!(summary.transactions.is_empty());
    }
}
