//! Internal representation of data.

use crate::{
    error::DatabaseError,
    types::{
        Category, Expense, ExpenseId, LedgerSnapshot, NewExpense, NewSettlement, NewSplit,
        NewUser, SettledDebt, SharedSplit, User,
    },
};

pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub mod sqlite;

/// This trait abstracts over the type of database.
///
/// The implementation could save the data in any suitable database or even in memory,
/// as long as the multi-row operations are atomic.
pub trait Database {
    /// Register a new user.
    ///
    /// Emails are unique: registering an email twice is rejected.
    fn add_user(&mut self, user: &NewUser) -> DatabaseResult<User>;

    /// Get the list of all users, ordered by ID.
    fn get_users(&self) -> DatabaseResult<Vec<User>>;

    /// Get the user registered with the given *email*, if any.
    fn get_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    /// Save a personal expense.
    ///
    /// The category is created if it does not exist yet.
    fn add_expense(&mut self, expense: &NewExpense) -> DatabaseResult<Expense>;

    /// Save a shared expense together with its splits.
    ///
    /// Either the expense and all of its splits are saved, or nothing is.
    fn add_shared_expense(
        &mut self,
        expense: &NewExpense,
        splits: &[NewSplit],
    ) -> DatabaseResult<Expense>;

    /// Delete the expense with the given *expense_id* and its splits.
    ///
    /// Settlements that referenced the expense are kept as standalone ones. Returns
    /// false if there was no such expense.
    fn delete_expense(&mut self, expense_id: ExpenseId) -> DatabaseResult<bool>;

    /// Get the list of all expenses, most recent first.
    fn get_expenses(&self) -> DatabaseResult<Vec<Expense>>;

    /// Get the list of all categories, ordered by name.
    fn get_categories(&self) -> DatabaseResult<Vec<Category>>;

    /// Check if any expense references the category with the given *name*.
    fn category_in_use(&self, name: &str) -> DatabaseResult<bool>;

    /// Delete the category with the given *name*.
    ///
    /// Rejected if the category does not exist or if any expense references it.
    fn delete_category(&mut self, name: &str) -> DatabaseResult<()>;

    /// Get the list of all splits of all shared expenses.
    fn get_shared_splits(&self) -> DatabaseResult<Vec<SharedSplit>>;

    /// Get the splits of the expense with the given *expense_id*.
    fn get_splits_for_expense(&self, expense_id: ExpenseId) -> DatabaseResult<Vec<SharedSplit>>;

    /// Get the list of all settlements, oldest first.
    fn get_settlements(&self) -> DatabaseResult<Vec<SettledDebt>>;

    /// Read users, splits and settlements as one consistent snapshot.
    fn get_snapshot(&self) -> DatabaseResult<LedgerSnapshot>;

    /// Save a settlement if *precondition* accepts the current ledger.
    ///
    /// The snapshot given to *precondition* and the insert belong to the same write
    /// transaction, so no other settlement can be committed in between. Two
    /// settlements with the same expense, users and amount are rejected.
    fn save_settlement<F>(
        &mut self,
        settlement: &NewSettlement,
        precondition: F,
    ) -> DatabaseResult<SettledDebt>
    where
        F: FnOnce(&LedgerSnapshot) -> DatabaseResult<()>;
}
