use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::formatter::serialize_amount;

/// Money in cents.
pub type Amount = i64;

/// Largest amount accepted for a single record (one billion).
///
/// Keeps every sum over the ledger far away from `i64::MAX`.
pub const MAX_AMOUNT: Amount = 100_000_000_000;

pub type UserId = i64;
pub type ExpenseId = i64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Salted password hash.
    #[serde(skip)]
    pub credential: String,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub credential: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: Amount,
    pub category: String,
    pub description: Option<String>,
    pub payer: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewExpense {
    pub amount: Amount,
    pub category: String,
    pub description: Option<String>,
    pub payer: UserId,
}

/// One debt created by a shared expense: `owed_by` owes `amount` to `paid_by`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SharedSplit {
    pub expense_id: ExpenseId,
    pub paid_by: UserId,
    pub owed_by: UserId,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSplit {
    pub owed_by: UserId,
    pub amount: Amount,
}

/// How the cost of a shared expense is divided among its participants.
#[derive(Clone, Debug)]
pub enum Shares {
    Equal(Vec<UserId>),
    Exact(Vec<(UserId, Amount)>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettledDebt {
    pub id: i64,
    pub expense_id: Option<ExpenseId>,
    pub owed_by: UserId,
    pub paid_to: UserId,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: Amount,
    pub settled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSettlement {
    pub expense_id: Option<ExpenseId>,
    pub owed_by: UserId,
    pub paid_to: UserId,
    pub amount: Amount,
}

/// Read snapshot of everything the balance computation needs.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    pub users: Vec<User>,
    pub expense_ids: Vec<ExpenseId>,
    pub splits: Vec<SharedSplit>,
    pub settlements: Vec<SettledDebt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Balance {
    pub user_id: UserId,
    pub total_paid: Amount,
    pub total_owed: Amount,
    pub net_balance: Amount,
}

/// A suggested payment: `from` gives `amount` to `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub from: UserId,
    pub to: UserId,
    pub amount: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Open,
    PartiallySettled,
    FullySettled,
}

/// The user on whose behalf a request is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub user_id: UserId,
    pub name: String,
    #[serde(serialize_with = "serialize_amount")]
    pub total_paid: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub total_owed: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub net_balance: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuggestionView {
    pub from_id: UserId,
    pub to_id: UserId,
    pub from_name: String,
    pub to_name: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpendingSummary {
    pub user_id: UserId,
    #[serde(serialize_with = "serialize_amount")]
    pub total_paid: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub total_shared_paid: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub total_reimbursed: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub total_owed: Amount,
    #[serde(serialize_with = "serialize_amount")]
    pub net_spent: Amount,
    pub top_category: Option<String>,
    /// Expenses the user paid or shares in, most recent first.
    pub transactions: Vec<SpendingTransaction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Personal,
    Shared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpendingTransaction {
    pub expense_id: ExpenseId,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: Amount,
    pub description: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub kind: TransactionKind,
    /// Names of the users who owe a share, sorted.
    pub shared_with: Vec<String>,
    /// Every share is closed by a settlement; always false for personal expenses.
    pub settled: bool,
}

impl NewUser {
    /// `credential` is the password hash, never the password itself.
    pub fn new(name: &str, email: &str, credential: &str) -> NewUser {
        NewUser {
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            credential: credential.to_string(),
        }
    }
}

impl NewExpense {
    pub fn new(
        amount: Amount,
        category: &str,
        description: Option<String>,
        payer: UserId,
    ) -> NewExpense {
        NewExpense {
            amount,
            category: category.trim().to_lowercase(),
            description,
            payer,
        }
    }
}

impl SharedSplit {
    pub fn new(expense_id: ExpenseId, paid_by: UserId, owed_by: UserId, amount: Amount) -> Self {
        SharedSplit {
            expense_id,
            paid_by,
            owed_by,
            amount,
        }
    }
}

impl NewSplit {
    pub fn new(owed_by: UserId, amount: Amount) -> NewSplit {
        NewSplit { owed_by, amount }
    }
}

impl NewSettlement {
    pub fn new(
        owed_by: UserId,
        paid_to: UserId,
        amount: Amount,
        expense_id: Option<ExpenseId>,
    ) -> NewSettlement {
        NewSettlement {
            expense_id,
            owed_by,
            paid_to,
            amount,
        }
    }
}

impl Balance {
    pub fn zero(user_id: UserId) -> Balance {
        Balance {
            user_id,
            total_paid: 0,
            total_owed: 0,
            net_balance: 0,
        }
    }
}

impl Transaction {
    pub fn new(from: UserId, to: UserId, amount: Amount) -> Transaction {
        Transaction { from, to, amount }
    }
}

impl Session {
    pub fn new(user: &User) -> Session {
        Session {
            user_id: user.id,
            name: user.name.clone(),
        }
    }
}
