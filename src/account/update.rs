//! The account edit endpoint.

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::{
    Error,
    account::core::{
        Account, AccountId, AccountType, account_name_exists, get_account, update_account,
    },
    app_state::DatabaseState,
    auth::session::Session,
    color::validate_color,
    db::lock_database,
    family::require_family,
};

/// Form data for editing an account. The balance is deliberately absent;
/// it only moves through transactions or recalculation.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountData {
    /// The account name.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The display color.
    pub color: String,
}

/// Handle account edit form submission.
pub async fn update_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<AccountId>,
    Form(form): Form<UpdateAccountData>,
) -> Result<Json<Account>, Error> {
    let name = form.name.trim().to_owned();
    if name.is_empty() {
        return Err(Error::InvalidInput("account name is required".to_owned()));
    }
    validate_color(&form.color)?;

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_account(account_id, family_id, &connection)?;

    if account_name_exists(family_id, &name, Some(account_id), &connection)? {
        return Err(Error::DuplicateAccountName(name));
    }

    update_account(account_id, &name, form.account_type, &form.color, now, &connection)?;

    get_account(account_id, family_id, &connection).map(Json)
}
