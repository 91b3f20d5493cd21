//! Famledger is a multi-tenant personal-finance web service.
//!
//! Users belong to a family that shares accounts, categories, tags,
//! transactions and recurring-transaction rules. This library provides a
//! JSON REST API plus the recurring-transaction generation engine that
//! materializes ledger entries from recurrence rules.

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod bulk;
mod category;
mod color;
mod db;
mod endpoints;
mod family;
mod health;
mod pagination;
mod password;
mod recurring;
mod routing;
mod tag;
mod timestamp;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use auth::session::SessionStore;
pub use db::initialize as initialize_db;
pub use pagination::PaginationConfig;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use timestamp::Timestamp;
pub use timezone::local_offset_or_utc;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid email/password combination.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request carried no valid session cookie, or the session has
    /// expired or failed the fingerprint check.
    #[error("authentication required")]
    NotAuthenticated,

    /// The CSRF token was missing from a mutating request or did not match
    /// the session token.
    #[error("security validation failed, refresh the page and try again")]
    CsrfMismatch,

    /// Too many failed log-in attempts for this client or email.
    ///
    /// Carries the time at which the block lifts.
    #[error("too many failed log-in attempts, try again after {0}")]
    RateLimited(timestamp::Timestamp),

    /// The caller does not belong to a family, which the operation requires.
    #[error("user must belong to a family")]
    NotInFamily,

    /// The caller tried to create or join a family while already in one.
    #[error("you already belong to a family")]
    AlreadyInFamily,

    /// The operation requires the family admin role.
    #[error("only administrators can perform this operation")]
    AdminRequired,

    /// The caller is the only admin of a family that still has other
    /// members, so they cannot leave it.
    #[error("cannot leave family: promote another member to admin first")]
    LastAdmin,

    /// The family still has other live members, so it cannot be deleted.
    #[error("cannot delete family: there are other members in the family")]
    FamilyNotEmpty,

    /// The user's email already exists in the database.
    #[error("a user with this email already exists")]
    DuplicateEmail,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The account name is already used by a live account of the family.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// The category name is already used by a live category of the family.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The tag name is already used by a live tag of the family.
    #[error("the tag \"{0}\" already exists")]
    DuplicateTagName(String),

    /// The referenced parent category does not exist in the caller's family.
    #[error("parent category not found")]
    ParentCategoryNotFound,

    /// A category cannot be deleted while live subcategories reference it.
    #[error("cannot delete category with subcategories, delete subcategories first")]
    CategoryHasChildren,

    /// A category cannot be deleted while live transactions reference it.
    #[error("cannot delete category that is being used by transactions")]
    CategoryInUse,

    /// Re-parenting the category would make it its own ancestor.
    #[error("cannot create circular reference in category hierarchy")]
    CategoryCycle,

    /// A request field failed validation.
    ///
    /// Carries a human-readable description of what was wrong.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested resource was not found, does not belong to the
    /// caller's family, or is not in the expected deletion state.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A query was given an id that does not refer to a valid row.
    #[error("a referenced resource does not exist")]
    InvalidForeignKey,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 787 =>
            {
                Error::InvalidForeignKey
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::CsrfMismatch | Error::NotInFamily | Error::AdminRequired => {
                StatusCode::FORBIDDEN
            }
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::AlreadyInFamily
            | Error::LastAdmin
            | Error::FamilyNotEmpty
            | Error::DuplicateEmail
            | Error::DuplicateAccountName(_)
            | Error::DuplicateCategoryName(_)
            | Error::DuplicateTagName(_)
            | Error::CategoryHasChildren
            | Error::CategoryInUse
            | Error::CategoryCycle => StatusCode::CONFLICT,
            Error::TooWeak(_)
            | Error::ParentCategoryNotFound
            | Error::InvalidInput(_)
            | Error::InvalidForeignKey => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_) | Error::SqlError(_) | Error::DatabaseLockError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are logged server-side and replaced with a generic
        // message so that implementation details never reach the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "an internal error occurred, check the server logs for more details".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::http::StatusCode;

    use super::Error;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn sql_errors_map_to_500() {
        let error = Error::SqlError(rusqlite::Error::InvalidQuery);

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn no_rows_converts_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }
}
