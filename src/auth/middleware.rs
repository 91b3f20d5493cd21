//! Authentication and CSRF middleware for the protected API routes.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};

use crate::{
    AppState, Error, Timestamp,
    auth::{
        cookie::get_session_id_from_cookies,
        csrf::{extract_csrf_token, validate_csrf_token},
        fingerprint::validate_fingerprint,
        session::{Session, SessionStore},
    },
    timezone::local_offset_or_utc,
};

/// The state needed for the auth middleware.
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The server-side session store.
    pub session_store: SessionStore,
    /// The local timezone as a canonical timezone name.
    pub local_timezone: String,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_store: state.session_store.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid session cookie.
///
/// The session is placed into the request extensions and the request
/// executed normally if the cookie refers to a live session whose
/// fingerprint matches the caller; otherwise a 401 JSON response is
/// returned.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(session): Extension<Session>` to receive the session.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let now = Timestamp::now(local_offset_or_utc(&state.local_timezone));

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}. Rejecting request.");
            return Error::NotAuthenticated.into_response();
        }
    };

    let session_id = match get_session_id_from_cookies(&jar) {
        Ok(session_id) => session_id,
        Err(error) => return error.into_response(),
    };

    let session = match state.session_store.get(&session_id, now) {
        Ok(Some(session)) => session,
        Ok(None) => return Error::NotAuthenticated.into_response(),
        Err(error) => return error.into_response(),
    };

    if !validate_fingerprint(&parts.headers, &session.fingerprint) {
        tracing::warn!(
            "Fingerprint mismatch for session of user {}. Rejecting request.",
            session.user_id
        );
        return Error::NotAuthenticated.into_response();
    }

    parts.extensions.insert(session);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

/// Middleware function that validates the CSRF token on mutating requests.
///
/// Must run after [auth_guard] so that the session is available in the
/// request extensions. Non-mutating methods pass through untouched.
pub async fn csrf_guard(request: Request, next: Next) -> Response {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return next.run(request).await;
    }

    let session = match request.extensions().get::<Session>() {
        Some(session) => session,
        None => return Error::NotAuthenticated.into_response(),
    };

    let request_token = extract_csrf_token(request.headers());

    if !validate_csrf_token(request_token, &session.csrf_token) {
        tracing::warn!("CSRF validation failed for {}", request.uri().path());
        return Error::CsrfMismatch.into_response();
    }

    next.run(request).await
}
