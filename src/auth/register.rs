//! The user registration endpoint.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    Error, Timestamp,
    auth::{
        cookie::set_session_cookie,
        fingerprint::client_fingerprint,
        log_in::{LogInState, SessionResponse},
    },
    db::lock_database,
    password::{PasswordHash, ValidatedPassword},
    timezone::local_offset_or_utc,
    user::{UserRole, insert_user},
};

/// The form data for a registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    /// The new user's email address.
    pub email: String,
    /// The new user's display name.
    pub username: String,
    /// The new user's raw password.
    pub password: String,
}

/// Handler for registration requests.
///
/// Validates the email, username and password strength, creates the user
/// and logs them straight in with a short-lived session. New users are
/// created with the admin role so that they become the admin of whatever
/// family they go on to create.
pub async fn register_user(
    State(state): State<LogInState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    Form(register_data): Form<RegisterData>,
) -> Result<impl IntoResponse, Error> {
    let email = register_data.email.trim().to_lowercase();
    if !email.contains('@') || !email.contains('.') {
        return Err(Error::InvalidInput(
            "please enter a valid email address".to_owned(),
        ));
    }

    let username = register_data.username.trim();
    if username.chars().count() < 4 {
        return Err(Error::InvalidInput(
            "username must be at least 4 characters long".to_owned(),
        ));
    }

    let password = ValidatedPassword::new(&register_data.password)?;
    let password_hash = PasswordHash::new(password)?;

    let now = Timestamp::now(local_offset_or_utc(&state.local_timezone));

    let user = {
        let connection = lock_database(&state.db_connection)?;
        insert_user(
            username,
            &email,
            &password_hash,
            UserRole::Admin,
            now,
            &connection,
        )?
    };

    let session = state.session_store.create(
        user.id,
        &user.username,
        &user.email,
        &client_fingerprint(&headers),
        false,
        now,
    )?;

    let response = SessionResponse::from(&session);
    let jar = set_session_cookie(jar, &session.id, session.ttl());

    Ok((StatusCode::CREATED, jar, Json(response)))
}
