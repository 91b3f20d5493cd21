//! The account listing endpoint.

use axum::{Extension, Json, extract::State};

use crate::{
    Error,
    account::core::{Account, list_accounts},
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::require_family,
};

/// List the family's live accounts ordered by name.
pub async fn list_accounts_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    list_accounts(family_id, &connection).map(Json)
}
