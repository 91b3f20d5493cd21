//! This file defines the route handling log-in requests.
//! The session and cookie modules handle the lower level session logic.

use std::sync::{Arc, Mutex};

use axum::{
    Form, Json,
    extract::{FromRef, State},
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, Timestamp,
    app_state::create_cookie_key,
    auth::{
        cookie::set_session_cookie,
        fingerprint::{client_fingerprint, client_ip},
        rate_limit::RateLimiter,
        session::{Session, SessionStore},
    },
    db::lock_database,
    timezone::local_offset_or_utc,
    user::{UserId, get_user_by_email, update_last_login},
};

/// The state needed to perform a log-in.
#[derive(Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The server-side session store.
    pub session_store: SessionStore,
    /// The failed log-in attempt tracker.
    pub rate_limiter: RateLimiter,
    /// The local timezone as a canonical timezone name.
    pub local_timezone: String,
}

impl LogInState {
    /// Create a log-in state over a shared connection, deriving the cookie
    /// key from `cookie_secret`.
    pub fn new(
        cookie_secret: &str,
        db_connection: Arc<Mutex<Connection>>,
        local_timezone: &str,
    ) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            session_store: SessionStore::new(db_connection.clone()),
            rate_limiter: RateLimiter::new(db_connection.clone()),
            db_connection,
            local_timezone: local_timezone.to_owned(),
        }
    }
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
            session_store: state.session_store.clone(),
            rate_limiter: state.rate_limiter.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The form data for a log-in request.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogInData {
    /// The user's email address.
    pub email: String,
    /// The user's raw password.
    pub password: String,
    /// Whether to create a long-lived ("remember me") session.
    #[serde(default)]
    pub remember: bool,
}

/// The response body for a successful log-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The id of the logged-in user.
    pub user_id: UserId,
    /// The user's display name.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The CSRF token the client must echo on mutating requests.
    pub csrf_token: String,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            username: session.username.clone(),
            email: session.email.clone(),
            csrf_token: session.csrf_token.clone(),
        }
    }
}

/// Handler for log-in requests via the POST method.
///
/// On success the session cookie is set and the session details (including
/// the CSRF token) are returned. Invalid emails and invalid passwords
/// produce the same error so that the endpoint does not leak which emails
/// are registered. Failed attempts are counted per client IP and email;
/// exceeding the limit blocks further attempts for a cooldown period.
pub async fn post_log_in(
    State(state): State<LogInState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    Form(log_in_data): Form<LogInData>,
) -> Result<impl IntoResponse, Error> {
    let now = Timestamp::now(local_offset_or_utc(&state.local_timezone));
    let ip = client_ip(&headers);
    let email = log_in_data.email.trim().to_lowercase();

    state.rate_limiter.check(&ip, &email, now)?;

    let user = {
        let connection = lock_database(&state.db_connection)?;
        get_user_by_email(&email, &connection)
    };

    let user = match user {
        Ok(user) => user,
        Err(Error::NotFound) => {
            state.rate_limiter.record_failure(&ip, &email, now)?;
            return Err(Error::InvalidCredentials);
        }
        Err(error) => return Err(error),
    };

    if !user.password_hash.verify(&log_in_data.password)? {
        state.rate_limiter.record_failure(&ip, &email, now)?;
        return Err(Error::InvalidCredentials);
    }

    state.rate_limiter.clear(&ip, &email)?;

    {
        let connection = lock_database(&state.db_connection)?;
        update_last_login(user.id, now, &connection)?;
    }

    let session = state.session_store.create(
        user.id,
        &user.username,
        &user.email,
        &client_fingerprint(&headers),
        log_in_data.remember,
        now,
    )?;

    let response = SessionResponse::from(&session);
    let jar = set_session_cookie(jar, &session.id, session.ttl());

    Ok((jar, Json(response)))
}
