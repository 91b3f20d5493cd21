//! The change-password endpoint.

use axum::{Extension, Form, Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Timestamp,
    auth::{log_in::LogInState, session::Session},
    db::lock_database,
    password::{PasswordHash, ValidatedPassword},
    timezone::local_offset_or_utc,
    user::{get_user_by_id, update_password},
};

/// The form data for a password change request.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordData {
    /// The user's current raw password.
    pub current_password: String,
    /// The replacement raw password.
    pub new_password: String,
}

/// The response body for a successful password change.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordResponse {
    /// How many other sessions of the user were destroyed.
    pub destroyed_sessions: usize,
}

/// Handler for password change requests.
///
/// Verifies the current password, validates and stores the new one, and
/// destroys every other session of the user so that a stolen session
/// cannot outlive a password reset. The current session stays alive.
pub async fn change_password(
    State(state): State<LogInState>,
    Extension(session): Extension<Session>,
    Form(change_data): Form<ChangePasswordData>,
) -> Result<Json<ChangePasswordResponse>, Error> {
    let now = Timestamp::now(local_offset_or_utc(&state.local_timezone));

    let user = {
        let connection = lock_database(&state.db_connection)?;
        get_user_by_id(session.user_id, &connection)?
    };

    if !user.password_hash.verify(&change_data.current_password)? {
        return Err(Error::InvalidCredentials);
    }

    let new_password = ValidatedPassword::new(&change_data.new_password)?;
    let new_hash = PasswordHash::new(new_password)?;

    {
        let connection = lock_database(&state.db_connection)?;
        update_password(user.id, &new_hash, now, &connection)?;
    }

    let destroyed_sessions = state.session_store.destroy_others(user.id, &session.id)?;

    tracing::info!(
        "Password changed for user {}. Destroyed {destroyed_sessions} other sessions.",
        user.id
    );

    Ok(Json(ChangePasswordResponse { destroyed_sessions }))
}
