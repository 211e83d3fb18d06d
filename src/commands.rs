//! Definition of the command line subcommands and their dispatch.

use std::sync::Arc;

use clap::Subcommand;
use log::debug;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    database::Database,
    endpoints::{
        handle_add_expense, handle_add_shared_expense, handle_balances, handle_delete_category,
        handle_delete_expense, handle_expense_status, handle_fully_settled_expenses,
        handle_list_categories, handle_list_expenses, handle_list_settlements, handle_list_users,
        handle_open_session, handle_record_settlement, handle_register_user,
        handle_settlement_suggestions, handle_spending_summary,
    },
    error::LedgerError,
    formatter::{
        format_balances, format_categories, format_list_expenses, format_settlements,
        format_simple_list, format_status, format_suggestions, format_summary, format_users,
    },
    types::{ExpenseId, Session, UserId},
};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a new user; the password is taken from `--password`.
    Register { name: String, email: String },
    /// List all users.
    Users,
    /// Add a personal expense paid by the session user.
    Expense {
        #[arg(allow_hyphen_values = true)]
        amount: String,
        category: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Add an expense paid by the session user and shared with others.
    Shared {
        #[arg(allow_hyphen_values = true)]
        amount: String,
        category: String,
        /// Split equally among these user IDs (the payer may be included).
        #[arg(long = "with", value_delimiter = ',', required_unless_present = "shares")]
        participants: Vec<UserId>,
        /// Exact shares as `user_id=amount`; they must add up to the amount.
        #[arg(long = "share", conflicts_with = "participants")]
        shares: Vec<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete an expense; its settlements are kept as standalone ones.
    DeleteExpense { id: ExpenseId },
    /// List all expenses, most recent first.
    Expenses,
    /// List all categories.
    Categories,
    /// Delete a category that no expense uses.
    DeleteCategory { name: String },
    /// Show the balance of every user.
    Balances,
    /// Show the payments that settle all debts.
    Suggestions,
    /// Record a payment between two users.
    Settle {
        /// The user who received the money.
        #[arg(long)]
        to: UserId,
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// The user who paid; defaults to the session user.
        #[arg(long)]
        from: Option<UserId>,
        /// The expense this payment settles.
        #[arg(long)]
        expense: Option<ExpenseId>,
    },
    /// List all settlements.
    Settlements,
    /// List the IDs of the fully settled expenses.
    FullySettled,
    /// Show the settlement status of an expense.
    Status { id: ExpenseId },
    /// Show the spending summary of the session user.
    Summary,
}

/// Email and password given on the command line.
#[derive(Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Run a command and return what has to be printed.
pub async fn execute<D: Database>(
    command: Command,
    credentials: &Credentials<'_>,
    json: bool,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<String> {
    debug!("Executing {:?}", command);

    let output = match command {
        Command::Register { name, email } => {
            let user =
                handle_register_user(&name, &email, credentials.password, database).await?;
            render(json, &user, |u| format!("Registered {} with ID {}", u.name, u.id))?
        }
        Command::Users => {
            let users = handle_list_users(database).await?;
            render(json, &users, |u| format_users(u))?
        }
        Command::Expense {
            amount,
            category,
            description,
        } => {
            let session = open_session(credentials, database).await?;
            let expense =
                handle_add_expense(&session, &amount, &category, description, database).await?;
            render(json, &expense, |e| format!("Added expense {}", e.id))?
        }
        Command::Shared {
            amount,
            category,
            participants,
            shares,
            description,
        } => {
            let session = open_session(credentials, database).await?;
            let expense = handle_add_shared_expense(
                &session,
                &amount,
                &category,
                description,
                &participants,
                &shares,
                database,
            )
            .await?;
            render(json, &expense, |e| format!("Added shared expense {}", e.id))?
        }
        Command::DeleteExpense { id } => {
            let session = open_session(credentials, database).await?;
            handle_delete_expense(&session, id, database).await?;
            render(json, &id, |id| format!("Deleted expense {id}"))?
        }
        Command::Expenses => {
            let expenses = handle_list_expenses(database).await?;
            if json {
                serde_json::to_string_pretty(&expenses)?
            } else {
                let users = handle_list_users(database).await?;
                format_list_expenses(&expenses, &users)
            }
        }
        Command::Categories => {
            let categories = handle_list_categories(database).await?;
            render(json, &categories, |c| format_categories(c))?
        }
        Command::DeleteCategory { name } => {
            let session = open_session(credentials, database).await?;
            handle_delete_category(&session, &name, database).await?;
            render(json, &name, |name| format!("Deleted category {name}"))?
        }
        Command::Balances => {
            let balances = handle_balances(database).await?;
            render(json, &balances, |b| format_balances(b))?
        }
        Command::Suggestions => {
            let suggestions = handle_settlement_suggestions(database).await?;
            render(json, &suggestions, |s| format_suggestions(s))?
        }
        Command::Settle {
            to,
            amount,
            from,
            expense,
        } => {
            let session = open_session(credentials, database).await?;
            let settlement =
                handle_record_settlement(&session, from, to, &amount, expense, database).await?;
            render(json, &settlement, |s| format!("Recorded settlement {}", s.id))?
        }
        Command::Settlements => {
            let settlements = handle_list_settlements(database).await?;
            if json {
                serde_json::to_string_pretty(&settlements)?
            } else {
                let users = handle_list_users(database).await?;
                format_settlements(&settlements, &users)
            }
        }
        Command::FullySettled => {
            let ids = handle_fully_settled_expenses(database).await?;
            render(json, &ids, |ids| {
                let ids: Vec<_> = ids.iter().map(|id| id.to_string()).collect();
                format_simple_list(&ids)
            })?
        }
        Command::Status { id } => {
            let status = handle_expense_status(id, database).await?;
            render(json, &status, |s| format_status(id, *s))?
        }
        Command::Summary => {
            let session = open_session(credentials, database).await?;
            let summary = handle_spending_summary(&session, database).await?;
            render(json, &summary, |s| format_summary(s))?
        }
    };

    Ok(output)
}

async fn open_session<D: Database>(
    credentials: &Credentials<'_>,
    database: &Arc<Mutex<D>>,
) -> Result<Session, LedgerError> {
    handle_open_session(credentials.email, credentials.password, database).await
}

fn render<T, F>(json: bool, value: &T, format_text: F) -> anyhow::Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(format_text(value))
    }
}
