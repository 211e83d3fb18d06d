//! Core implementation of the ledger handlers.
//!
//! Every handler takes already tokenized input (amounts still as text, IDs as
//! numbers) and the shared store. The command line is a thin layer on top of
//! these functions, so they are also where most of the end-to-end tests live.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::{
    credential::{hash_password, verify_password},
    database::Database,
    error::{LedgerError, ValidationError},
    parser::{parse_amount, parse_share},
    settlement::{
        build_splits, compute_balances, expense_status, fully_settled_expenses, plan_settlements,
        record_settlement, spending_summary,
    },
    types::{
        BalanceView, Category, Expense, ExpenseId, ExpenseStatus, NewExpense, NewSettlement,
        NewUser, Session, SettledDebt, Shares, SpendingSummary, SuggestionView, User, UserId,
    },
    validator::{validate_category_exists, validate_email, validate_name, validate_users_exist},
};

/// Resolve the user acting on the ledger from their email and password.
///
/// An unknown email and a wrong password give the same error.
pub async fn handle_open_session<D: Database>(
    email: Option<&str>,
    password: Option<&str>,
    database: &Arc<Mutex<D>>,
) -> Result<Session, LedgerError> {
    let email = email
        .ok_or(ValidationError::SessionRequired)?
        .trim()
        .to_lowercase();
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(ValidationError::MissingField("password"))?;

    match database.lock().await.get_user_by_email(&email)? {
        Some(user) if verify_password(password, &user.credential) => {
            debug!("Session opened for user {} ({})", user.id, user.email);
            Ok(Session::new(&user))
        }
        _ => {
            warn!("Failed login for {email}");
            Err(ValidationError::InvalidCredentials.into())
        }
    }
}

pub async fn handle_register_user<D: Database>(
    name: &str,
    email: &str,
    password: Option<&str>,
    database: &Arc<Mutex<D>>,
) -> Result<User, LedgerError> {
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(ValidationError::MissingField("password"))?;
    let user = NewUser::new(name, email, &hash_password(password));
    validate_name(&user.name)?;
    validate_email(&user.email)?;

    let user = database.lock().await.add_user(&user)?;
    info!("Registered user {} <{}>", user.id, user.email);
    Ok(user)
}

pub async fn handle_list_users<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<User>, LedgerError> {
    Ok(database.lock().await.get_users()?)
}

/// Save an expense that only concerns the session user.
pub async fn handle_add_expense<D: Database>(
    session: &Session,
    amount: &str,
    category: &str,
    description: Option<String>,
    database: &Arc<Mutex<D>>,
) -> Result<Expense, LedgerError> {
    let expense = new_expense(session, amount, category, description)?;

    let expense = database.lock().await.add_expense(&expense)?;
    info!(
        "{} added expense {} of {} cents",
        session.name, expense.id, expense.amount
    );
    Ok(expense)
}

/// Save an expense paid by the session user and shared with others.
///
/// Without exact `shares` (formatted as `user_id=amount`) the amount is divided
/// equally among `participants`, which may include the payer.
pub async fn handle_add_shared_expense<D: Database>(
    session: &Session,
    amount: &str,
    category: &str,
    description: Option<String>,
    participants: &[UserId],
    shares: &[String],
    database: &Arc<Mutex<D>>,
) -> Result<Expense, LedgerError> {
    let expense = new_expense(session, amount, category, description)?;

    let shares = if shares.is_empty() {
        Shares::Equal(participants.to_vec())
    } else {
        let shares = shares
            .iter()
            .map(|s| parse_share(s))
            .collect::<Result<Vec<_>, _>>()?;
        Shares::Exact(shares)
    };

    let splits = build_splits(expense.amount, expense.payer, &shares)?;

    let mut users: Vec<_> = splits.iter().map(|s| s.owed_by).collect();
    users.push(expense.payer);
    validate_users_exist(&users, database).await?;

    let expense = database
        .lock()
        .await
        .add_shared_expense(&expense, &splits)?;
    info!(
        "{} added shared expense {} of {} cents split with {} users",
        session.name,
        expense.id,
        expense.amount,
        splits.len()
    );
    Ok(expense)
}

fn new_expense(
    session: &Session,
    amount: &str,
    category: &str,
    description: Option<String>,
) -> Result<NewExpense, ValidationError> {
    let amount = parse_amount(amount)?;
    if category.trim().is_empty() {
        return Err(ValidationError::MissingField("category"));
    }
    let description = description.filter(|d| !d.trim().is_empty());
    Ok(NewExpense::new(amount, category, description, session.user_id))
}

/// Delete an expense and its splits; its settlements become standalone.
pub async fn handle_delete_expense<D: Database>(
    session: &Session,
    expense_id: ExpenseId,
    database: &Arc<Mutex<D>>,
) -> Result<(), LedgerError> {
    if database.lock().await.delete_expense(expense_id)? {
        info!("{} deleted expense {expense_id}", session.name);
        Ok(())
    } else {
        Err(ValidationError::UnknownExpense(expense_id).into())
    }
}

pub async fn handle_list_expenses<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<Expense>, LedgerError> {
    Ok(database.lock().await.get_expenses()?)
}

pub async fn handle_list_categories<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<Category>, LedgerError> {
    Ok(database.lock().await.get_categories()?)
}

pub async fn handle_delete_category<D: Database>(
    session: &Session,
    name: &str,
    database: &Arc<Mutex<D>>,
) -> Result<(), LedgerError> {
    let name = name.trim().to_lowercase();
    validate_category_exists(&name, database).await?;

    let mut database = database.lock().await;
    if database.category_in_use(&name)? {
        warn!(
            "{} tried to delete category {name}, which is in use",
            session.name
        );
        return Err(ValidationError::CategoryInUse(name).into());
    }
    database.delete_category(&name)?;
    info!("{} deleted category {name}", session.name);
    Ok(())
}

/// Current balance of every user, ordered by user ID.
pub async fn handle_balances<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<BalanceView>, LedgerError> {
    let snapshot = database.lock().await.get_snapshot()?;
    let balances = compute_balances(&snapshot.users, &snapshot.splits, &snapshot.settlements)?;
    let names = names_by_id(&snapshot.users);

    Ok(balances
        .into_values()
        .map(|b| BalanceView {
            name: names.get(&b.user_id).cloned().unwrap_or_default(),
            user_id: b.user_id,
            total_paid: b.total_paid,
            total_owed: b.total_owed,
            net_balance: b.net_balance,
        })
        .collect())
}

/// Payments that would bring every balance to zero.
pub async fn handle_settlement_suggestions<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<SuggestionView>, LedgerError> {
    let snapshot = database.lock().await.get_snapshot()?;
    let balances = compute_balances(&snapshot.users, &snapshot.splits, &snapshot.settlements)?;
    let balances: Vec<_> = balances.into_values().collect();

    let plan = plan_settlements(&balances).map_err(|e| {
        warn!("Cannot suggest settlements: {e}");
        e
    })?;
    let names = names_by_id(&snapshot.users);

    Ok(plan
        .into_iter()
        .map(|t| SuggestionView {
            from_id: t.from,
            to_id: t.to,
            from_name: names.get(&t.from).cloned().unwrap_or_default(),
            to_name: names.get(&t.to).cloned().unwrap_or_default(),
            amount: t.amount,
        })
        .collect())
}

/// Record that `owed_by` (the session user when missing) paid `paid_to`.
pub async fn handle_record_settlement<D: Database>(
    session: &Session,
    owed_by: Option<UserId>,
    paid_to: UserId,
    amount: &str,
    expense_id: Option<ExpenseId>,
    database: &Arc<Mutex<D>>,
) -> Result<SettledDebt, LedgerError> {
    let amount = parse_amount(amount)?;
    let owed_by = owed_by.unwrap_or(session.user_id);

    record_settlement(
        database,
        session,
        NewSettlement::new(owed_by, paid_to, amount, expense_id),
    )
    .await
}

pub async fn handle_list_settlements<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<SettledDebt>, LedgerError> {
    Ok(database.lock().await.get_settlements()?)
}

pub async fn handle_fully_settled_expenses<D: Database>(
    database: &Arc<Mutex<D>>,
) -> Result<Vec<ExpenseId>, LedgerError> {
    let database = database.lock().await;
    let splits = database.get_shared_splits()?;
    let settlements = database.get_settlements()?;
    Ok(fully_settled_expenses(&splits, &settlements))
}

/// Settlement state of one expense; `None` for a personal expense.
pub async fn handle_expense_status<D: Database>(
    expense_id: ExpenseId,
    database: &Arc<Mutex<D>>,
) -> Result<Option<ExpenseStatus>, LedgerError> {
    let database = database.lock().await;
    if !database.get_expenses()?.iter().any(|e| e.id == expense_id) {
        return Err(ValidationError::UnknownExpense(expense_id).into());
    }

    let splits = database.get_splits_for_expense(expense_id)?;
    let settlements = database.get_settlements()?;
    Ok(expense_status(&splits, &settlements))
}

pub async fn handle_spending_summary<D: Database>(
    session: &Session,
    database: &Arc<Mutex<D>>,
) -> Result<SpendingSummary, LedgerError> {
    let database = database.lock().await;
    let users = database.get_users()?;
    let expenses = database.get_expenses()?;
    let splits = database.get_shared_splits()?;
    let settlements = database.get_settlements()?;
    Ok(spending_summary(
        session.user_id,
        &users,
        &expenses,
        &splits,
        &settlements,
    ))
}

fn names_by_id(users: &[User]) -> HashMap<UserId, String> {
    users.iter().map(|u| (u.id, u.name.clone())).collect()
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::database::sqlite::SqliteDatabase;
    use crate::types::{TransactionKind, MAX_AMOUNT};

    struct Ledger {
        _dir: TempDir,
        database: Arc<Mutex<SqliteDatabase>>,
        sessions: Vec<Session>,
    }

    async fn ledger(names: &[&str]) -> anyhow::Result<Ledger> {
        let dir = TempDir::new("splitledger")?;
        let database = Arc::new(Mutex::new(SqliteDatabase::new(
            dir.path().join("ledger.db"),
        )?));

        let mut sessions = vec![];
        for name in names {
            let email = format!("{name}@example.com");
            handle_register_user(name, &email, Some("secret"), &database).await?;
            let session = handle_open_session(Some(email.as_str()), Some("secret"), &database).await?;
            sessions.push(session);
        }

        Ok(Ledger {
            _dir: dir,
            database,
            sessions,
        })
    }

    fn nets(balances: &[BalanceView]) -> Vec<(UserId, i64)> {
        balances.iter().map(|b| (b.user_id, b.net_balance)).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sessions() -> anyhow::Result<()> {
        let l = ledger(&["alice"]).await?;

        let session =
            handle_open_session(Some(" ALICE@example.com "), Some("secret"), &l.database).await?;
        assert_eq!(session, l.sessions[0]);

        let result = handle_open_session(None, Some("secret"), &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::SessionRequired))
        ));

        let result = handle_open_session(Some("alice@example.com"), None, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::MissingField(
                "password"
            )))
        ));

        for (email, password) in [("alice@example.com", "wrong"), ("bob@example.com", "secret")] {
            let result = handle_open_session(Some(email), Some(password), &l.database).await;
            assert!(matches!(
                result,
                Err(LedgerError::Validation(ValidationError::InvalidCredentials))
            ));
        }

        let result = handle_register_user("bob", "bob@example.com", None, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::MissingField(
                "password"
            )))
        ));
        let result = handle_register_user("", "bob@example.com", Some("x"), &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::InvalidName(_)))
        ));
        let result = handle_register_user("bob", "bob", Some("x"), &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::InvalidEmail(_)))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_equal_split_flow() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob", "carol"]).await?;
        let alice = &l.sessions[0];

        let expense = handle_add_shared_expense(
            alice,
            "30",
            "Food",
            Some("pizza".to_string()),
            &[1, 2, 3],
            &[],
            &l.database,
        )
        .await?;
        assert_eq!(expense.category, "food");

        let balances = handle_balances(&l.database).await?;
        assert_eq!(nets(&balances), vec![(1, 2000), (2, -1000), (3, -1000)]);
        assert_eq!(balances[0].name, "alice");

        let suggestions = handle_settlement_suggestions(&l.database).await?;
        let pairs: Vec<_> = suggestions
            .iter()
            .map(|s| (s.from_name.as_str(), s.to_name.as_str(), s.amount))
            .collect();
        assert_eq!(pairs, vec![("bob", "alice", 1000), ("carol", "alice", 1000)]);

        assert_eq!(
            handle_expense_status(expense.id, &l.database).await?,
            Some(ExpenseStatus::Open)
        );

        let bob = &l.sessions[1];
        handle_record_settlement(bob, None, 1, "10", Some(expense.id), &l.database).await?;
        assert_eq!(
            handle_expense_status(expense.id, &l.database).await?,
            Some(ExpenseStatus::PartiallySettled)
        );
        assert!(handle_fully_settled_expenses(&l.database).await?.is_empty());

        // Recorded on carol's behalf.
        handle_record_settlement(alice, Some(3), 1, "10.00", Some(expense.id), &l.database)
            .await?;
        assert_eq!(
            handle_fully_settled_expenses(&l.database).await?,
            vec![expense.id]
        );
        assert!(handle_settlement_suggestions(&l.database)
            .await?
            .is_empty());

        let balances = handle_balances(&l.database).await?;
        assert!(balances.iter().all(|b| b.net_balance == 0));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remainder_stays_with_payer() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob", "carol"]).await?;

        handle_add_shared_expense(&l.sessions[0], "10", "food", None, &[1, 2, 3], &[], &l.database)
            .await?;

        let balances = handle_balances(&l.database).await?;
        assert_eq!(nets(&balances), vec![(1, 666), (2, -333), (3, -333)]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exact_shares() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob", "carol"]).await?;
        let shares = vec!["2=12.50".to_string(), "3=7,5".to_string()];

        handle_add_shared_expense(&l.sessions[0], "20", "rent", None, &[], &shares, &l.database)
            .await?;

        let balances = handle_balances(&l.database).await?;
        assert_eq!(nets(&balances), vec![(1, 2000), (2, -1250), (3, -750)]);

        let wrong = vec!["2=10".to_string(), "3=5".to_string()];
        let result =
            handle_add_shared_expense(&l.sessions[0], "20", "rent", None, &[], &wrong, &l.database)
                .await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::SharesMismatch { .. }))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_participant_saves_nothing() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;

        let result =
            handle_add_shared_expense(&l.sessions[0], "20", "food", None, &[1, 7], &[], &l.database)
                .await;

        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::UnknownUser(7)))
        ));
        assert!(handle_list_expenses(&l.database).await?.is_empty());
        assert!(handle_list_categories(&l.database).await?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_amounts() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;
        let alice = &l.sessions[0];

        for amount in ["0", "-5", "1.234", "abc", ""] {
            let result = handle_add_expense(alice, amount, "food", None, &l.database).await;
            assert!(
                matches!(result, Err(LedgerError::Validation(_))),
                "{amount} should be rejected"
            );
        }

        let result = handle_add_expense(alice, "5", " ", None, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::MissingField(
                "category"
            )))
        ));

        let result = handle_record_settlement(alice, None, 1, "5", None, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::SelfSettlement))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_huge_amounts_are_rejected() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;
        let alice = &l.sessions[0];

        for _ in 0..2 {
            let result = handle_add_shared_expense(
                alice,
                "900000000000000",
                "food",
                None,
                &[1, 2],
                &[],
                &l.database,
            )
            .await;
            assert!(matches!(
                result,
                Err(LedgerError::Validation(ValidationError::AmountTooLarge))
            ));
        }

        handle_add_shared_expense(alice, "1000000000", "food", None, &[2], &[], &l.database)
            .await?;
        handle_add_shared_expense(alice, "1000000000", "food", None, &[2], &[], &l.database)
            .await?;
        let balances = handle_balances(&l.database).await?;
        assert_eq!(
            nets(&balances),
            vec![(1, 2 * MAX_AMOUNT), (2, -2 * MAX_AMOUNT)]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_standalone_settlement_is_bounded_by_debt() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;
        handle_add_shared_expense(&l.sessions[0], "30", "food", None, &[2], &[], &l.database)
            .await?;
        let bob = &l.sessions[1];

        let result = handle_record_settlement(bob, None, 1, "40", None, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::ExceedsDebt { .. }))
        ));

        handle_record_settlement(bob, None, 1, "20", None, &l.database).await?;
        let balances = handle_balances(&l.database).await?;
        assert_eq!(nets(&balances), vec![(1, 1000), (2, -1000)]);
        assert_eq!(handle_list_settlements(&l.database).await?.len(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_expense_and_category() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;
        let alice = &l.sessions[0];
        let expense = handle_add_expense(alice, "12", "books", None, &l.database).await?;

        assert_eq!(handle_expense_status(expense.id, &l.database).await?, None);

        let result = handle_delete_category(alice, "Books", &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::CategoryInUse(_)))
        ));

        handle_delete_expense(alice, expense.id, &l.database).await?;
        let result = handle_delete_expense(alice, expense.id, &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::UnknownExpense(_)))
        ));

        handle_delete_category(alice, "Books", &l.database).await?;
        let result = handle_delete_category(alice, "books", &l.database).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::UnknownCategory(_)))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spending_summary() -> anyhow::Result<()> {
        let l = ledger(&["alice", "bob"]).await?;
        let alice = &l.sessions[0];
        let books = handle_add_expense(alice, "15", "books", None, &l.database).await?;
        let shared =
            handle_add_shared_expense(alice, "40", "food", None, &[1, 2], &[], &l.database).await?;
        handle_record_settlement(&l.sessions[1], None, 1, "20", Some(shared.id), &l.database)
            .await?;

        let summary = handle_spending_summary(alice, &l.database).await?;

        assert_eq!(summary.total_paid, 5500);
        assert_eq!(summary.total_shared_paid, 2000);
        assert_eq!(summary.total_reimbursed, 2000);
        assert_eq!(summary.total_owed, 0);
        assert_eq!(summary.net_spent, 3500);
        assert_eq!(summary.top_category.as_deref(), Some("food"));

        let transactions: Vec<_> = summary
            .transactions
            .iter()
            .map(|t| (t.expense_id, t.kind, t.settled))
            .collect();
        assert_eq!(
            transactions,
            vec![
                (shared.id, TransactionKind::Shared, true),
                (books.id, TransactionKind::Personal, false),
            ]
        );
        assert_eq!(summary.transactions[0].shared_with, vec!["bob"]);

        let bob = handle_spending_summary(&l.sessions[1], &l.database).await?;
        assert_eq!(bob.transactions.len(), 1);
        assert_eq!(bob.transactions[0].expense_id, shared.id);
        Ok(())
    }
}
