//! The occurrence log: one row per materialized occurrence of a rule.
//!
//! The UNIQUE constraint on `(recurring_transaction_id, execution_time)`
//! is the idempotency guarantee. Claiming an occurrence is a single
//! `INSERT OR IGNORE`, so two generators racing on the same occurrence
//! cannot both materialize it; there is no separate existence check to
//! race past.

use rusqlite::Connection;

use crate::{Error, Timestamp, recurring::core::RecurringTransactionId, transaction::TransactionId};

/// Database identifier for an occurrence log row.
pub type RecurringTransactionLogId = i64;

/// Create the occurrence log table in the database.
pub fn create_recurring_transaction_log_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction_log (
            id INTEGER PRIMARY KEY,
            recurring_transaction_id INTEGER NOT NULL,
            generated_transaction_id INTEGER,
            execution_time TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id)
                ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(generated_transaction_id) REFERENCES \"transaction\"(id)
                ON UPDATE CASCADE ON DELETE SET NULL,
            UNIQUE(recurring_transaction_id, execution_time)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_transaction_log_rule_id
         ON recurring_transaction_log(recurring_transaction_id)",
        (),
    )?;

    Ok(())
}

/// Atomically claim the occurrence of `rule_id` at `execution_time`.
///
/// Returns the id of the new log row, or `None` when the occurrence was
/// already logged (in which case nothing is written).
pub(super) fn claim_occurrence(
    rule_id: RecurringTransactionId,
    execution_time: Timestamp,
    now: Timestamp,
    connection: &Connection,
) -> Result<Option<RecurringTransactionLogId>, Error> {
    let inserted = connection.execute(
        "INSERT OR IGNORE INTO recurring_transaction_log
         (recurring_transaction_id, execution_time, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        (rule_id, execution_time, now),
    )?;

    if inserted == 0 {
        return Ok(None);
    }

    Ok(Some(connection.last_insert_rowid()))
}

/// Link a claimed log row to the ledger transaction it produced.
pub(super) fn set_generated_transaction(
    log_id: RecurringTransactionLogId,
    transaction_id: TransactionId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE recurring_transaction_log
         SET generated_transaction_id = ?1, updated_at = ?2
         WHERE id = ?3",
        (transaction_id, now, log_id),
    )?;

    Ok(())
}

/// Count the logged occurrences of `rule_id`.
pub(super) fn count_logged_occurrences(
    rule_id: RecurringTransactionId,
    connection: &Connection,
) -> Result<i64, Error> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM recurring_transaction_log WHERE recurring_transaction_id = ?1",
        [rule_id],
        |row| row.get(0),
    )?;

    Ok(count)
}
