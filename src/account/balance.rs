//! Daily balance snapshots and balance recalculation.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    Error, Timestamp,
    account::core::{Account, AccountId, get_account, set_balance},
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::require_family,
    transaction::TransactionType,
};

/// Create the account balance snapshot table in the database.
pub fn create_account_balance_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_balance (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            balance REAL NOT NULL,
            cash_balance REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(account_id, date)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_balance_account_id
         ON account_balance(account_id)",
        (),
    )?;

    Ok(())
}

/// Record the account's current balance as its snapshot for the day of
/// `now`, replacing an existing snapshot for that day.
///
/// Called whenever an operation changes an account balance. The cash
/// balance currently mirrors the total balance.
pub fn upsert_daily_balance(
    account_id: AccountId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    let balance: f64 = connection.query_row(
        "SELECT balance FROM account WHERE id = ?1",
        [account_id],
        |row| row.get(0),
    )?;

    connection.execute(
        "INSERT INTO account_balance (account_id, date, balance, cash_balance, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3, ?4, ?4)
         ON CONFLICT(account_id, date) DO UPDATE
         SET balance = excluded.balance,
             cash_balance = excluded.cash_balance,
             updated_at = excluded.updated_at,
             deleted_at = NULL",
        (account_id, now.format_date(), balance, now),
    )?;

    Ok(())
}

/// Recompute the account's running balance from its live transactions and
/// refresh today's snapshot. Returns the recomputed balance.
pub(super) fn recalculate_account_balance(
    account_id: AccountId,
    now: Timestamp,
    connection: &Connection,
) -> Result<f64, Error> {
    let balance = connection
        .prepare(
            "SELECT amount, type FROM \"transaction\"
             WHERE account_id = :account_id AND deleted_at IS NULL",
        )?
        .query_map(&[(":account_id", &account_id)], |row| {
            let amount: f64 = row.get(0)?;
            let transaction_type: TransactionType = row.get(1)?;

            Ok(transaction_type.signed_amount(amount))
        })?
        .try_fold(0.0, |total, maybe_delta| maybe_delta.map(|delta| total + delta))?;

    set_balance(account_id, balance, now, connection)?;
    upsert_daily_balance(account_id, now, connection)?;

    Ok(balance)
}

/// Refresh the daily balance snapshot for an account.
pub async fn update_daily_balance_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;

    let (family_id, _) = require_family(session.user_id, &connection)?;
    get_account(account_id, family_id, &connection)?;

    upsert_daily_balance(account_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Recompute an account's balance from its transaction history.
///
/// Useful when a client suspects the running balance has drifted from the
/// ledger, e.g. after an interrupted bulk operation.
pub async fn recalculate_balance_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;

    let (family_id, _) = require_family(session.user_id, &connection)?;
    get_account(account_id, family_id, &connection)?;

    recalculate_account_balance(account_id, now, &connection)?;

    let account = get_account(account_id, family_id, &connection)?;

    Ok(Json(account))
}

#[cfg(test)]
mod balance_tests {
    use rusqlite::Connection;

    use crate::{
        account::test_utils::insert_test_account,
        db::initialize,
        user::test_utils::{insert_test_family, insert_test_user, test_now},
    };

    use super::{recalculate_account_balance, upsert_daily_balance};

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        insert_test_user("tester@example.com", &connection);
        connection
    }

    #[test]
    fn snapshot_is_replaced_within_the_same_day() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);

        upsert_daily_balance(account.id, test_now(), &connection).unwrap();

        connection
            .execute("UPDATE account SET balance = 250.0 WHERE id = ?1", [account.id])
            .unwrap();

        upsert_daily_balance(account.id, test_now(), &connection).unwrap();

        let (count, balance): (i64, f64) = connection
            .query_row(
                "SELECT COUNT(*), MAX(balance) FROM account_balance WHERE account_id = ?1",
                [account.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(balance, 250.0);
    }

    #[test]
    fn recalculate_uses_signed_amounts() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);

        for (amount, transaction_type) in
            [(100.0, "Income"), (30.0, "Expense"), (20.0, "LoanRepayment")]
        {
            connection
                .execute(
                    "INSERT INTO \"transaction\"
                     (account_id, user_id, date, name, amount, type, created_at, updated_at)
                     VALUES (?1, 1, ?2, 'test', ?3, ?4, ?2, ?2)",
                    (account.id, test_now(), amount, transaction_type),
                )
                .unwrap();
        }

        let balance = recalculate_account_balance(account.id, test_now(), &connection).unwrap();

        assert_eq!(balance, 90.0);
    }

    #[test]
    fn recalculate_ignores_soft_deleted_transactions() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);

        connection
            .execute(
                "INSERT INTO \"transaction\"
                 (account_id, user_id, date, name, amount, type, created_at, updated_at, deleted_at)
                 VALUES (?1, 1, ?2, 'gone', 100.0, 'Income', ?2, ?2, ?2)",
                (account.id, test_now()),
            )
            .unwrap();

        let balance = recalculate_account_balance(account.id, test_now(), &connection).unwrap();

        assert_eq!(balance, 0.0);
    }
}
