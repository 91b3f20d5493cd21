//! Soft-delete and restore endpoints for accounts.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Error,
    account::core::{
        Account, AccountId, account_name_exists, get_account, get_deleted_account,
        restore_account, soft_delete_account,
    },
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::require_family,
};

/// Soft-delete an account. Its transactions and rules stay in place so a
/// restore brings everything back.
pub async fn delete_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_account(account_id, family_id, &connection)?;
    soft_delete_account(account_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted account, unless a live account took its name
/// in the meantime.
pub async fn restore_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let account = get_deleted_account(account_id, family_id, &connection)?;

    if account_name_exists(family_id, &account.name, Some(account_id), &connection)? {
        return Err(Error::DuplicateAccountName(account.name));
    }

    restore_account(account_id, now, &connection)?;

    get_account(account_id, family_id, &connection).map(Json)
}
