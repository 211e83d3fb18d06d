//! Functions that check the validity of user input by running queries to the database.
//!
//! These checks are necessary in order to return nice error messages,
//! but the database still enforces the same constraints when the actual
//! query is run (in that case, a generic concurrency error is enough).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::{LedgerError, ValidationError};
use crate::types::UserId;

/// Check that all users provided by the caller exist in the database.
pub async fn validate_users_exist<D: Database>(
    users: &[UserId],
    database: &Arc<Mutex<D>>,
) -> Result<(), LedgerError> {
    if !users.is_empty() {
        let registered_users = database.lock().await.get_users()?;
        let registered_users: HashSet<_> = registered_users.into_iter().map(|u| u.id).collect();

        for user in users {
            if !registered_users.contains(user) {
                return Err(ValidationError::UnknownUser(*user).into());
            }
        }
    }
    Ok(())
}

/// Check that a category with the given name exists in the database.
pub async fn validate_category_exists<D: Database>(
    name: &str,
    database: &Arc<Mutex<D>>,
) -> Result<(), LedgerError> {
    let categories = database.lock().await.get_categories()?;

    if categories.iter().any(|c| c.name == name) {
        Ok(())
    } else {
        Err(ValidationError::UnknownCategory(name.to_string()).into())
    }
}
