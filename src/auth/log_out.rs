//! The log-out endpoint.

use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    Error,
    auth::{cookie::invalidate_session_cookie, middleware::AuthState, session::Session},
};

/// Destroy the caller's session and expire the session cookie.
pub async fn post_log_out(
    State(state): State<AuthState>,
    Extension(session): Extension<Session>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, Error> {
    state.session_store.destroy(&session.id)?;

    Ok((invalidate_session_cookie(jar), StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod log_out_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, response::IntoResponse};
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use rusqlite::Connection;
    use sha2::{Digest, Sha512};
    use time::UtcOffset;

    use crate::{
        Timestamp,
        auth::{
            middleware::AuthState,
            session::{SessionStore, create_session_table},
        },
    };

    use super::post_log_out;

    #[tokio::test]
    async fn log_out_destroys_session() {
        let connection = Connection::open_in_memory().unwrap();
        create_session_table(&connection).unwrap();
        let store = SessionStore::new(Arc::new(Mutex::new(connection)));
        let now = Timestamp::now(UtcOffset::UTC);
        let session = store
            .create(1, "alice", "alice@example.com", "fp", false, now)
            .unwrap();

        let hash = Sha512::digest("secret");
        let state = AuthState {
            cookie_key: Key::from(&hash),
            session_store: store.clone(),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        let response = post_log_out(State(state), Extension(session.clone()), jar)
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
        assert!(store.get(&session.id, now).unwrap().is_none());
    }
}
