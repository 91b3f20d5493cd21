//! Log-in rate limiting backed by the application database.
//!
//! Failed attempts are counted per client IP and per email address. Five
//! failures inside a one hour window block the key for thirty minutes.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};
use time::Duration;

use crate::{Error, Timestamp, db::lock_database};

/// How many failures are tolerated before a key is blocked.
const MAX_ATTEMPTS: i64 = 5;

/// The sliding window in which failures accumulate.
const ATTEMPT_WINDOW: Duration = Duration::hours(1);

/// How long a key stays blocked once the limit is hit.
const BLOCK_DURATION: Duration = Duration::minutes(30);

const SCOPE_IP: &str = "ip";
const SCOPE_EMAIL: &str = "email";

/// Tracks failed log-in attempts in the `login_attempt` table.
///
/// Injected into the log-in handler through the application state; nothing
/// is cached in process memory, so restarts do not reset active blocks.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    db_connection: Arc<Mutex<Connection>>,
}

impl RateLimiter {
    /// Create a rate limiter over the shared database connection.
    pub fn new(db_connection: Arc<Mutex<Connection>>) -> Self {
        Self { db_connection }
    }

    /// Check whether `ip` or `email` is currently blocked.
    ///
    /// # Errors
    /// Returns [Error::RateLimited] with the unblock time when a block is
    /// active, or a database error.
    pub fn check(&self, ip: &str, email: &str, now: Timestamp) -> Result<(), Error> {
        let connection = lock_database(&self.db_connection)?;

        for (scope, key) in [(SCOPE_IP, ip), (SCOPE_EMAIL, email)] {
            let blocked_until: Option<Timestamp> = connection
                .query_row(
                    "SELECT blocked_until FROM login_attempt WHERE scope = ?1 AND key = ?2",
                    (scope, key),
                    |row| row.get(0),
                )
                .optional()?
                .flatten();

            if let Some(unblock_time) = blocked_until
                && now < unblock_time
            {
                return Err(Error::RateLimited(unblock_time));
            }
        }

        Ok(())
    }

    /// Record a failed log-in attempt for both `ip` and `email`.
    ///
    /// Counters reset once the previous attempt is older than the window;
    /// reaching the limit stamps a block.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn record_failure(&self, ip: &str, email: &str, now: Timestamp) -> Result<(), Error> {
        let connection = lock_database(&self.db_connection)?;

        for (scope, key) in [(SCOPE_IP, ip), (SCOPE_EMAIL, email)] {
            record_key_failure(&connection, scope, key, now)?;
        }

        Ok(())
    }

    /// Forget the failure history for `ip` and `email` after a successful
    /// log-in.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn clear(&self, ip: &str, email: &str) -> Result<(), Error> {
        let connection = lock_database(&self.db_connection)?;

        for (scope, key) in [(SCOPE_IP, ip), (SCOPE_EMAIL, email)] {
            connection.execute(
                "DELETE FROM login_attempt WHERE scope = ?1 AND key = ?2",
                (scope, key),
            )?;
        }

        Ok(())
    }
}

fn record_key_failure(
    connection: &Connection,
    scope: &str,
    key: &str,
    now: Timestamp,
) -> Result<(), Error> {
    let existing: Option<(i64, Timestamp)> = connection
        .query_row(
            "SELECT count, last_attempt FROM login_attempt WHERE scope = ?1 AND key = ?2",
            (scope, key),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let count = match existing {
        Some((count, last_attempt)) if now - last_attempt <= ATTEMPT_WINDOW => count + 1,
        _ => 1,
    };

    let blocked_until = (count >= MAX_ATTEMPTS).then(|| now + BLOCK_DURATION);

    connection.execute(
        "INSERT INTO login_attempt (scope, key, count, last_attempt, blocked_until)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(scope, key) DO UPDATE
         SET count = excluded.count,
             last_attempt = excluded.last_attempt,
             blocked_until = excluded.blocked_until",
        (scope, key, count, now, blocked_until),
    )?;

    Ok(())
}

/// Create the login attempt table in the database.
pub fn create_login_attempt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS login_attempt (
            scope TEXT NOT NULL,
            key TEXT NOT NULL,
            count INTEGER NOT NULL,
            last_attempt TEXT NOT NULL,
            blocked_until TEXT,
            PRIMARY KEY (scope, key)
        )",
        (),
    )?;

    Ok(())
}
