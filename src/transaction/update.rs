//! The transaction edit endpoint.

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
};

use crate::{
    Error,
    account::{adjust_balance, upsert_daily_balance},
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::require_family,
    tag::resolve_tag_names,
    transaction::{
        core::{
            Transaction, TransactionId, get_transaction, set_transaction_tags, update_transaction,
        },
        create::{TransactionFormData, resolve_form},
    },
};

/// Handle transaction edit form submission.
///
/// The old signed amount is reversed before the new one is applied so that
/// the running balances stay consistent, including when the transaction
/// moves between accounts.
pub async fn update_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(transaction_id): Path<TransactionId>,
    Form(form): Form<TransactionFormData>,
) -> Result<Json<Transaction>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let existing = get_transaction(transaction_id, family_id, &connection)?;
    let new_transaction = resolve_form(&form, family_id, existing.user_id, now, &connection)?;

    adjust_balance(
        existing.account_id,
        -existing.transaction_type.signed_amount(existing.amount),
        now,
        &connection,
    )?;

    update_transaction(transaction_id, &new_transaction, now, &connection)?;

    if let Some(raw_tags) = form.tags.as_deref() {
        let tag_ids = resolve_tag_names(family_id, raw_tags, now, &connection)?;
        set_transaction_tags(transaction_id, &tag_ids, &connection)?;
    }

    adjust_balance(
        new_transaction.account_id,
        new_transaction
            .transaction_type
            .signed_amount(new_transaction.amount),
        now,
        &connection,
    )?;

    upsert_daily_balance(existing.account_id, now, &connection)?;
    if new_transaction.account_id != existing.account_id {
        upsert_daily_balance(new_transaction.account_id, now, &connection)?;
    }

    get_transaction(transaction_id, family_id, &connection).map(Json)
}
