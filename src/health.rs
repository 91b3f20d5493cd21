//! A simple health probe reporting database reachability.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{Error, app_state::DatabaseState, db::lock_database};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// Report whether the server and its database are reachable.
///
/// This endpoint is not behind the auth middleware so that load balancers
/// can probe it.
pub async fn get_health(State(state): State<DatabaseState>) -> Result<impl IntoResponse, Error> {
    let connection = lock_database(&state.db_connection)?;

    connection.query_row("SELECT 1", [], |_| Ok(()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        database: "reachable",
    }))
}
