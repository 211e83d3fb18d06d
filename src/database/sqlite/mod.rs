//! The implementation of a data storage using Sqlite.

use std::os::raw::c_int;
use std::path::Path;

use chrono::Utc;
use log::debug;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, TransactionBehavior};
use tokio::task::block_in_place;

use crate::{
    error::{DatabaseError, ValidationError},
    types::{
        Category, Expense, ExpenseId, LedgerSnapshot, NewExpense, NewSettlement, NewSplit,
        NewUser, SettledDebt, SharedSplit, User,
    },
};

use super::{Database, DatabaseResult};

mod schema;

pub struct SqliteDatabase {
    connection: Connection,
}

impl SqliteDatabase {
    pub fn new<P: AsRef<Path>>(path: P) -> DatabaseResult<SqliteDatabase> {
        block_in_place(|| {
            let connection = Connection::open(path.as_ref())
                .map_err(|e| DatabaseError::new("cannot open database", e.into()))?;
            schema::create_all_tables(&connection)
                .map_err(|e| DatabaseError::new("cannot create tables", e))?;
            debug!("Opened ledger at {}", path.as_ref().display());
            Ok(SqliteDatabase { connection })
        })
    }
}

impl Database for SqliteDatabase {
    fn add_user(&mut self, user: &NewUser) -> DatabaseResult<User> {
        let fn_impl = || -> anyhow::Result<User> {
            let id: i64 = self
                .connection
                .query_row(
                    "INSERT INTO app_user (name, email, credential) VALUES (?1, ?2, ?3) RETURNING id",
                    params![&user.name, &user.email, &user.credential],
                    |row| row.get(0),
                )
                .map_err(|e| {
                    on_constraint(e, ffi::SQLITE_CONSTRAINT_UNIQUE, || {
                        ValidationError::EmailInUse(user.email.clone()).into()
                    })
                })?;

            debug!("user_id is {id}");

            Ok(User {
                id,
                name: user.name.clone(),
                email: user.email.clone(),
                credential: user.credential.clone(),
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add user", e)))
    }

    fn get_users(&self) -> DatabaseResult<Vec<User>> {
        block_in_place(|| {
            query_users(&self.connection).map_err(|e| map_error("cannot get users", e))
        })
    }

    fn get_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let fn_impl = || -> anyhow::Result<Option<User>> {
            let user = self
                .connection
                .query_row(
                    "SELECT id, name, email, credential FROM app_user WHERE email = ?1",
                    params![&email],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get user by email", e)))
    }

    fn add_expense(&mut self, expense: &NewExpense) -> DatabaseResult<Expense> {
        let mut fn_impl = || -> anyhow::Result<Expense> {
            let tx = self.connection.transaction()?;
            let saved = insert_expense(&tx, expense)?;
            tx.commit()?;
            Ok(saved)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add expense", e)))
    }

    fn add_shared_expense(
        &mut self,
        expense: &NewExpense,
        splits: &[NewSplit],
    ) -> DatabaseResult<Expense> {
        let mut fn_impl = || -> anyhow::Result<Expense> {
            let tx = self.connection.transaction()?;
            let saved = insert_expense(&tx, expense)?;

            {
                let mut insert_split_stmt = tx.prepare_cached(
                    "INSERT INTO shared_split (expense_id, paid_by, owed_by, amount)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;

                for split in splits {
                    insert_split_stmt
                        .execute(params![&saved.id, &saved.payer, &split.owed_by, &split.amount])
                        .map_err(|e| {
                            on_constraint(e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY, || {
                                DatabaseError::concurrency("the participant was not found")
                            })
                        })?;
                }
            }

            tx.commit()?;

            debug!("expense_id is {}, {} splits", saved.id, splits.len());
            Ok(saved)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add shared expense", e)))
    }

    fn delete_expense(&mut self, expense_id: ExpenseId) -> DatabaseResult<bool> {
        debug!("Deleting expense. Expense ID: {expense_id}");
        let fn_impl = || -> anyhow::Result<bool> {
            let num_deleted_rows = self
                .connection
                .execute("DELETE FROM expense WHERE id = ?1", params![&expense_id])?;
            Ok(num_deleted_rows > 0)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot delete expense", e)))
    }

    fn get_expenses(&self) -> DatabaseResult<Vec<Expense>> {
        let fn_impl = || -> anyhow::Result<Vec<Expense>> {
            let mut stmt = self.connection.prepare_cached(
                "SELECT e.id, e.amount, c.name, e.description, e.payer, e.created_at FROM expense e
                 INNER JOIN category c ON e.category_id = c.id
                 ORDER BY e.created_at DESC, e.id DESC",
            )?;

            let expense_iter = stmt.query_map([], |row| {
                Ok(Expense {
                    id: row.get(0)?,
                    amount: row.get(1)?,
                    category: row.get(2)?,
                    description: row.get(3)?,
                    payer: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;

            let expenses = expense_iter.collect::<Result<_, _>>()?;
            Ok(expenses)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get expenses", e)))
    }

    fn get_categories(&self) -> DatabaseResult<Vec<Category>> {
        let fn_impl = || -> anyhow::Result<Vec<Category>> {
            let mut stmt = self
                .connection
                .prepare_cached("SELECT id, name FROM category ORDER BY name")?;

            let category_iter = stmt.query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;

            let categories = category_iter.collect::<Result<_, _>>()?;
            Ok(categories)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get categories", e)))
    }

    fn category_in_use(&self, name: &str) -> DatabaseResult<bool> {
        block_in_place(|| {
            query_category_in_use(&self.connection, name)
                .map_err(|e| map_error("cannot check if category is in use", e))
        })
    }

    fn delete_category(&mut self, name: &str) -> DatabaseResult<()> {
        debug!("Deleting category. Name: {name}");
        let mut fn_impl = || -> anyhow::Result<()> {
            let tx = self
                .connection
                .transaction_with_behavior(TransactionBehavior::Immediate)?;

            if query_category_in_use(&tx, name)? {
                return Err(DatabaseError::from(ValidationError::CategoryInUse(
                    name.to_string(),
                ))
                .into());
            }

            let num_deleted_rows =
                tx.execute("DELETE FROM category WHERE name = ?1", params![&name])?;
            if num_deleted_rows == 0 {
                return Err(DatabaseError::from(ValidationError::UnknownCategory(
                    name.to_string(),
                ))
                .into());
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot delete category", e)))
    }

    fn get_shared_splits(&self) -> DatabaseResult<Vec<SharedSplit>> {
        block_in_place(|| {
            query_splits(&self.connection).map_err(|e| map_error("cannot get shared splits", e))
        })
    }

    fn get_splits_for_expense(&self, expense_id: ExpenseId) -> DatabaseResult<Vec<SharedSplit>> {
        let fn_impl = || -> anyhow::Result<Vec<SharedSplit>> {
            let mut stmt = self.connection.prepare_cached(
                "SELECT expense_id, paid_by, owed_by, amount FROM shared_split
                 WHERE expense_id = ?1 ORDER BY rowid",
            )?;

            let split_iter = stmt.query_map(params![&expense_id], split_from_row)?;

            let splits = split_iter.collect::<Result<_, _>>()?;
            Ok(splits)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get splits for expense", e)))
    }

    fn get_settlements(&self) -> DatabaseResult<Vec<SettledDebt>> {
        block_in_place(|| {
            query_settlements(&self.connection).map_err(|e| map_error("cannot get settlements", e))
        })
    }

    fn get_snapshot(&self) -> DatabaseResult<LedgerSnapshot> {
        let fn_impl = || -> anyhow::Result<LedgerSnapshot> {
            // Read-only, so an unchecked transaction is enough to get a single view.
            let tx = self.connection.unchecked_transaction()?;
            let snapshot = read_snapshot(&tx)?;
            tx.commit()?;
            Ok(snapshot)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot read ledger snapshot", e)))
    }

    fn save_settlement<F>(
        &mut self,
        settlement: &NewSettlement,
        precondition: F,
    ) -> DatabaseResult<SettledDebt>
    where
        F: FnOnce(&LedgerSnapshot) -> DatabaseResult<()>,
    {
        let fn_impl = || -> anyhow::Result<SettledDebt> {
            let tx = self
                .connection
                .transaction_with_behavior(TransactionBehavior::Immediate)?;

            let snapshot = read_snapshot(&tx)?;
            precondition(&snapshot)?;

            let settled_at = Utc::now();
            let id: i64 = tx
                .query_row(
                    "INSERT INTO settled_debt (expense_id, owed_by, paid_to, amount, settled_at)
                     VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                    params![
                        &settlement.expense_id,
                        &settlement.owed_by,
                        &settlement.paid_to,
                        &settlement.amount,
                        &settled_at
                    ],
                    |row| row.get(0),
                )
                .map_err(|e| map_settlement_constraint(e, settlement))?;

            tx.commit()?;

            debug!("settlement_id is {id}");

            Ok(SettledDebt {
                id,
                expense_id: settlement.expense_id,
                owed_by: settlement.owed_by,
                paid_to: settlement.paid_to,
                amount: settlement.amount,
                settled_at,
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot save settlement", e)))
    }
}

fn insert_expense(tx: &Connection, expense: &NewExpense) -> anyhow::Result<Expense> {
    tx.execute(
        "INSERT OR IGNORE INTO category (name) VALUES (?1)",
        params![&expense.category],
    )?;
    let category_id: i64 = tx.query_row(
        "SELECT id FROM category WHERE name = ?1",
        params![&expense.category],
        |row| row.get(0),
    )?;

    let created_at = Utc::now();
    let id: i64 = {
        let mut insert_expense_stmt = tx.prepare_cached(
            "INSERT INTO expense (amount, category_id, description, payer, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
        )?;

        insert_expense_stmt
            .query_row(
                params![
                    &expense.amount,
                    &category_id,
                    &expense.description,
                    &expense.payer,
                    &created_at
                ],
                |row| row.get(0),
            )
            .map_err(|e| {
                on_constraint(e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY, || {
                    DatabaseError::concurrency("the payer was not found")
                })
            })?
    };

    Ok(Expense {
        id,
        amount: expense.amount,
        category: expense.category.clone(),
        description: expense.description.clone(),
        payer: expense.payer,
        created_at,
    })
}

fn query_category_in_use(connection: &Connection, name: &str) -> anyhow::Result<bool> {
    let expense_id: Option<i64> = connection
        .query_row(
            "SELECT e.id FROM expense e
             INNER JOIN category c ON e.category_id = c.id
             WHERE c.name = ?1 LIMIT 1",
            params![&name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(expense_id.is_some())
}

fn read_snapshot(connection: &Connection) -> anyhow::Result<LedgerSnapshot> {
    Ok(LedgerSnapshot {
        users: query_users(connection)?,
        expense_ids: query_expense_ids(connection)?,
        splits: query_splits(connection)?,
        settlements: query_settlements(connection)?,
    })
}

fn query_users(connection: &Connection) -> anyhow::Result<Vec<User>> {
    let mut stmt =
        connection.prepare_cached("SELECT id, name, email, credential FROM app_user ORDER BY id")?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<_, _>>()?;
    Ok(users)
}

fn query_expense_ids(connection: &Connection) -> anyhow::Result<Vec<ExpenseId>> {
    let mut stmt = connection.prepare_cached("SELECT id FROM expense ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(ids)
}

fn query_splits(connection: &Connection) -> anyhow::Result<Vec<SharedSplit>> {
    let mut stmt = connection.prepare_cached(
        "SELECT expense_id, paid_by, owed_by, amount FROM shared_split
         ORDER BY expense_id, rowid",
    )?;
    let splits = stmt
        .query_map([], split_from_row)?
        .collect::<Result<_, _>>()?;
    Ok(splits)
}

// Matching depends on this order: older settlements close splits first.
fn query_settlements(connection: &Connection) -> anyhow::Result<Vec<SettledDebt>> {
    let mut stmt = connection.prepare_cached(
        "SELECT id, expense_id, owed_by, paid_to, amount, settled_at FROM settled_debt
         ORDER BY id",
    )?;
    let settlements = stmt
        .query_map([], |row| {
            Ok(SettledDebt {
                id: row.get(0)?,
                expense_id: row.get(1)?,
                owed_by: row.get(2)?,
                paid_to: row.get(3)?,
                amount: row.get(4)?,
                settled_at: row.get(5)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(settlements)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        credential: row.get(3)?,
    })
}

fn split_from_row(row: &Row) -> rusqlite::Result<SharedSplit> {
    Ok(SharedSplit::new(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
    ))
}

fn map_settlement_constraint(e: rusqlite::Error, settlement: &NewSettlement) -> anyhow::Error {
    match constraint_code(&e) {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            DatabaseError::from(ValidationError::DuplicateSettlement).into()
        }
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => match settlement.expense_id {
            Some(expense_id) => {
                DatabaseError::from(ValidationError::UnknownExpense(expense_id)).into()
            }
            None => DatabaseError::concurrency("the user was not found").into(),
        },
        _ => e.into(),
    }
}

/// Replace the error with *rejection* if it is a violation of the given constraint.
fn on_constraint<F>(e: rusqlite::Error, code: c_int, rejection: F) -> anyhow::Error
where
    F: FnOnce() -> DatabaseError,
{
    if constraint_code(&e) == Some(code) {
        rejection().into()
    } else {
        e.into()
    }
}

fn constraint_code(e: &rusqlite::Error) -> Option<c_int> {
    match e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn map_error<T: AsRef<str>>(message: T, e: anyhow::Error) -> DatabaseError {
    match e.downcast::<DatabaseError>() {
        Ok(e) => e,
        Err(e) => DatabaseError::new(message, e),
    }
}
