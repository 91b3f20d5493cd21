//! Database initialization and shared connection helpers.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error,
    account::{create_account_balance_table, create_account_table},
    auth::{rate_limit::create_login_attempt_table, session::create_session_table},
    category::create_category_table,
    family::create_family_table,
    recurring::{
        create_recurring_transaction_log_table, create_recurring_transaction_table,
        create_recurring_transaction_tag_table,
    },
    tag::create_tag_table,
    transaction::{create_transaction_table, create_transaction_tag_table},
    user::create_user_table,
};

/// Create the application schema if it does not exist yet.
///
/// All tables are created inside a single exclusive transaction so that two
/// server instances racing at start-up cannot observe a half-built schema.
///
/// # Errors
/// Returns an error if any of the table creation statements fail.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Foreign keys are off by default in SQLite; the purge operations rely
    // on ON DELETE CASCADE / SET NULL behaviour.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_family_table(&transaction)?;
    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_account_balance_table(&transaction)?;
    create_category_table(&transaction)?;
    create_tag_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_transaction_tag_table(&transaction)?;
    create_recurring_transaction_table(&transaction)?;
    create_recurring_transaction_tag_table(&transaction)?;
    create_recurring_transaction_log_table(&transaction)?;
    create_session_table(&transaction)?;
    create_login_attempt_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Acquire the shared database connection lock.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned, which is
/// logged since it means another request panicked while holding it.
pub(crate) fn lock_database(
    connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn schema_creation_succeeds() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert!(initialize(&connection).is_ok());
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        initialize(&connection).unwrap();

        assert!(initialize(&connection).is_ok());
    }
}
