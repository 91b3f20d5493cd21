//! Server-side sessions persisted in the application database.
//!
//! Sessions are a key-value store with a TTL: the session id is a random
//! 256-bit hex string handed to the client in a private cookie, and the row
//! carries everything the middleware needs to authenticate a request
//! without touching the user table.

use std::sync::{Arc, Mutex};

use rand::RngCore;
use rusqlite::{Connection, Row};
use time::Duration;

use crate::{Error, Timestamp, auth::csrf::generate_csrf_token, db::lock_database, user::UserId};

/// How long a session without "remember me" is valid.
pub const SHORT_SESSION_TTL: Duration = Duration::hours(24);

/// How long a "remember me" session is valid.
pub const LONG_SESSION_TTL: Duration = Duration::days(30);

/// A logged-in user's server-side session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The random session id, also stored in the client's cookie.
    pub id: String,
    /// The id of the logged-in user.
    pub user_id: UserId,
    /// The user's display name at log-in time.
    pub username: String,
    /// The user's email at log-in time.
    pub email: String,
    /// When the session was created.
    pub created_at: Timestamp,
    /// Hash of the client characteristics recorded at log-in.
    pub fingerprint: String,
    /// The CSRF token issued to this session.
    pub csrf_token: String,
    /// Whether the session uses the long ("remember me") TTL.
    pub long_lived: bool,
}

impl Session {
    /// The TTL that applies to this session.
    pub fn ttl(&self) -> Duration {
        if self.long_lived {
            LONG_SESSION_TTL
        } else {
            SHORT_SESSION_TTL
        }
    }

    fn is_expired(&self, now: Timestamp) -> bool {
        now - self.created_at > self.ttl()
    }
}

/// Generate a 32-byte random hex string for use as a session id.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    hex::encode(bytes)
}

/// Access to the session table.
///
/// The store is injected into handlers through the application state so
/// that nothing holds session data in module-level statics.
#[derive(Debug, Clone)]
pub struct SessionStore {
    db_connection: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Create a store over the shared database connection.
    pub fn new(db_connection: Arc<Mutex<Connection>>) -> Self {
        Self { db_connection }
    }

    /// Create a session for `user_id` and persist it.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn create(
        &self,
        user_id: UserId,
        username: &str,
        email: &str,
        fingerprint: &str,
        long_lived: bool,
        now: Timestamp,
    ) -> Result<Session, Error> {
        let session = Session {
            id: generate_session_id(),
            user_id,
            username: username.to_owned(),
            email: email.to_owned(),
            created_at: now,
            fingerprint: fingerprint.to_owned(),
            csrf_token: generate_csrf_token(),
            long_lived,
        };

        let connection = lock_database(&self.db_connection)?;
        connection.execute(
            "INSERT INTO session (id, user_id, username, email, created_at, fingerprint, csrf_token, long_lived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                &session.id,
                session.user_id,
                &session.username,
                &session.email,
                session.created_at,
                &session.fingerprint,
                &session.csrf_token,
                session.long_lived,
            ),
        )?;

        Ok(session)
    }

    /// Look up a session by id, treating `now` as the current time.
    ///
    /// Expired sessions are deleted on sight and reported as absent.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn get(&self, session_id: &str, now: Timestamp) -> Result<Option<Session>, Error> {
        let connection = lock_database(&self.db_connection)?;

        let session = connection
            .prepare(
                "SELECT id, user_id, username, email, created_at, fingerprint, csrf_token, long_lived
                 FROM session WHERE id = :id",
            )?
            .query_row(&[(":id", &session_id)], map_session_row);

        let session = match session {
            Ok(session) => session,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        if session.is_expired(now) {
            connection.execute("DELETE FROM session WHERE id = ?1", [session_id])?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Delete the session with `session_id`, if it exists.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn destroy(&self, session_id: &str) -> Result<(), Error> {
        let connection = lock_database(&self.db_connection)?;
        connection.execute("DELETE FROM session WHERE id = ?1", [session_id])?;

        Ok(())
    }

    /// Delete every session belonging to `user_id` except `current_session_id`.
    ///
    /// Returns the number of sessions destroyed. Used after a password
    /// change so that stolen sessions stop working.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn destroy_others(
        &self,
        user_id: UserId,
        current_session_id: &str,
    ) -> Result<usize, Error> {
        let connection = lock_database(&self.db_connection)?;
        let destroyed = connection.execute(
            "DELETE FROM session WHERE user_id = ?1 AND id != ?2",
            (user_id, current_session_id),
        )?;

        Ok(destroyed)
    }

    /// Delete all sessions that have outlived their TTL as of `now`.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    /// Returns an error if the database is unavailable.
    pub fn purge_expired(&self, now: Timestamp) -> Result<usize, Error> {
        let short_cutoff = now + (-SHORT_SESSION_TTL);
        let long_cutoff = now + (-LONG_SESSION_TTL);

        let connection = lock_database(&self.db_connection)?;
        let purged = connection.execute(
            "DELETE FROM session
             WHERE (long_lived = 0 AND created_at < ?1) OR (long_lived = 1 AND created_at < ?2)",
            (short_cutoff, long_cutoff),
        )?;

        Ok(purged)
    }
}

/// Create the session table in the database.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            csrf_token TEXT NOT NULL,
            long_lived INTEGER NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_user_id ON session(user_id)",
        (),
    )?;

    Ok(())
}

fn map_session_row(row: &Row) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
        fingerprint: row.get(5)?,
        csrf_token: row.get(6)?,
        long_lived: row.get(7)?,
    })
}
