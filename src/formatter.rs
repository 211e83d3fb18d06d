//! Produce the strings printed by the command line.
//! Amounts are stored in cents and only become decimals here.

use std::iter::repeat;

use serde::Serializer;

use crate::types::{
    Amount, BalanceView, Category, Expense, ExpenseStatus, SettledDebt, SpendingSummary,
    SpendingTransaction, SuggestionView, TransactionKind, User,
};

const AMOUNT_TO_FLOAT_DIVISOR: f64 = 100.0;

pub fn format_amount(amount: Amount) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let cents = amount.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn format_signed_amount(amount: Amount) -> String {
    if amount > 0 {
        format!("+{}", format_amount(amount))
    } else {
        format_amount(amount)
    }
}

/// Serialize an amount in cents as a JSON number with two decimals.
pub fn serialize_amount<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(*amount as f64 / AMOUNT_TO_FLOAT_DIVISOR)
}

pub fn format_balances(balances: &[BalanceView]) -> String {
    if balances.is_empty() {
        return "Nothing to show!".to_string();
    }

    let width = max_len(balances.iter().map(|b| b.name.as_str()));
    balances
        .iter()
        .map(|b| {
            format!(
                "{}  paid {:>10}  owed {:>10}  net {:>10}",
                pad(&b.name, width),
                format_amount(b.total_paid),
                format_amount(b.total_owed),
                format_signed_amount(b.net_balance)
            )
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_suggestions(suggestions: &[SuggestionView]) -> String {
    if suggestions.is_empty() {
        return "All clean!".to_string();
    }

    // Debtors are padded so that the amounts are aligned.
    let width = max_len(suggestions.iter().map(|s| s.from_name.as_str()));
    suggestions
        .iter()
        .map(|s| {
            format!(
                "{} pays {}  to {}",
                pad(&s.from_name, width),
                format_amount(s.amount),
                s.to_name
            )
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_list_expenses(expenses: &[Expense], users: &[User]) -> String {
    if expenses.is_empty() {
        return "Nothing to show!".to_string();
    }

    expenses
        .iter()
        .map(|e| {
            let result = format!(
                "{}: {} paid {} [{}]",
                e.id,
                user_name(users, e.payer),
                format_amount(e.amount),
                e.category
            );
            match &e.description {
                Some(description) => format!("{result} - {description}"),
                None => result,
            }
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_settlements(settlements: &[SettledDebt], users: &[User]) -> String {
    if settlements.is_empty() {
        return "Nothing to show!".to_string();
    }

    settlements
        .iter()
        .map(|s| {
            let expense = match s.expense_id {
                Some(id) => format!(" (expense {id})"),
                None => String::new(),
            };
            format!(
                "{}: {} paid {} to {}{} on {}",
                s.id,
                user_name(users, s.owed_by),
                format_amount(s.amount),
                user_name(users, s.paid_to),
                expense,
                s.settled_at.format("%Y-%m-%d %H:%M")
            )
        })
        .fold(String::new(), |a, b| a + &b + "\n")
}

pub fn format_users(users: &[User]) -> String {
    let lines: Vec<_> = users
        .iter()
        .map(|u| format!("{}: {} <{}>", u.id, u.name, u.email))
        .collect();
    format_simple_list(&lines)
}

pub fn format_categories(categories: &[Category]) -> String {
    let names: Vec<_> = categories.iter().map(|c| &c.name).collect();
    format_simple_list(&names)
}

pub fn format_status(expense_id: i64, status: Option<ExpenseStatus>) -> String {
    match status {
        None => format!("Expense {expense_id} is not shared"),
        Some(ExpenseStatus::Open) => format!("Expense {expense_id} is open"),
        Some(ExpenseStatus::PartiallySettled) => {
            format!("Expense {expense_id} is partially settled")
        }
        Some(ExpenseStatus::FullySettled) => format!("Expense {expense_id} is fully settled"),
    }
}

pub fn format_summary(summary: &SpendingSummary) -> String {
    let rows = [
        ("paid", format_amount(summary.total_paid)),
        ("paid for others", format_amount(summary.total_shared_paid)),
        ("reimbursed", format_amount(summary.total_reimbursed)),
        ("still owed", format_amount(summary.total_owed)),
        ("net spent", format_amount(summary.net_spent)),
        (
            "top category",
            summary
                .top_category
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    let width = max_len(rows.iter().map(|(label, _)| *label));
    let totals = rows
        .iter()
        .map(|(label, value)| format!("{}  {}", pad(label, width), value))
        .fold(String::new(), |a, b| a + &b + "\n");

    summary
        .transactions
        .iter()
        .map(format_transaction)
        .fold(totals, |a, b| a + &b + "\n")
}

fn format_transaction(transaction: &SpendingTransaction) -> String {
    let result = format!(
        "{}: {} [{}]",
        transaction.expense_id,
        format_amount(transaction.amount),
        transaction.category
    );
    match transaction.kind {
        TransactionKind::Personal => format!("{result} personal"),
        TransactionKind::Shared => format!(
            "{result} shared with {}, {}",
            transaction.shared_with.join(", "),
            if transaction.settled { "settled" } else { "open" }
        ),
    }
}

pub fn format_simple_list<T: AsRef<str>>(elements: &[T]) -> String {
    if elements.is_empty() {
        "Nothing to show!".to_string()
    } else {
        elements
            .iter()
            .map(|g| format!("- {}", g.as_ref()))
            .fold(String::new(), |a, b| a + &b + "\n")
    }
}

fn user_name(users: &[User], id: i64) -> String {
    users
        .iter()
        .find(|u| u.id == id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

fn max_len<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0)
}

fn pad(s: &str, target_length: usize) -> String {
    let length = s.chars().count();
    if length < target_length {
        s.to_string() + &make_string_of_char(' ', target_length - length)
    } else {
        s.to_string()
    }
}

fn make_string_of_char(c: char, length: usize) -> String {
    repeat(c).take(length).collect::<String>()
}
