//! The family read endpoint.

use axum::{Extension, Json, extract::State};
use serde::Serialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::core::{Family, get_family, require_family},
    user::{FamilyMember, list_family_members},
};

/// Aggregate counts of the family's live data.
#[derive(Debug, Serialize)]
pub struct FamilyCounts {
    members: i64,
    accounts: i64,
    categories: i64,
    tags: i64,
}

/// The caller's family with its members and aggregate counts.
#[derive(Debug, Serialize)]
pub struct FamilyResponse {
    /// The family itself.
    pub family: Family,
    /// The live members of the family.
    pub members: Vec<FamilyMember>,
    /// Counts of the family's live data.
    pub counts: FamilyCounts,
}

/// Return the caller's family, its live members and aggregate counts.
pub async fn get_family_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<Json<FamilyResponse>, Error> {
    let connection = lock_database(&state.db_connection)?;

    let (family_id, _) = require_family(session.user_id, &connection)?;
    let family = get_family(family_id, &connection)?;
    let members = list_family_members(family_id, &connection)?;

    let count_live = |table: &str| -> Result<i64, Error> {
        let count = connection.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE family_id = ?1 AND deleted_at IS NULL"),
            [family_id],
            |row| row.get(0),
        )?;

        Ok(count)
    };

    let counts = FamilyCounts {
        members: members.len() as i64,
        accounts: count_live("account")?,
        categories: count_live("category")?,
        tags: count_live("tag")?,
    };

    Ok(Json(FamilyResponse {
        family,
        members,
        counts,
    }))
}
