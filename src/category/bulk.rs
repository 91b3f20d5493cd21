//! Bulk restore and purge for soft-deleted categories.

use axum::{Extension, Form, Json, extract::State};
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    bulk::{BulkIdsData, MAX_BULK, SkippedItem, parse_ids},
    db::lock_database,
    family::{FamilyId, require_family},
    category::core::{CategoryId, category_name_exists, get_category, purge_category},
};

/// The response body for a bulk restore of categories.
#[derive(Debug, Serialize)]
pub struct BulkRestoreResponse {
    /// How many categories were restored.
    pub restored: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

/// The response body for a bulk purge of categories.
#[derive(Debug, Serialize)]
pub struct BulkPurgeResponse {
    /// How many categories were permanently deleted.
    pub purged: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

struct Candidate {
    name: String,
    parent_id: Option<CategoryId>,
    is_deleted: bool,
}

fn find_candidate(
    category_id: CategoryId,
    family_id: FamilyId,
    connection: &rusqlite::Connection,
) -> Result<Option<Candidate>, Error> {
    connection
        .query_row(
            "SELECT name, parent_id, deleted_at IS NOT NULL FROM category
             WHERE id = ?1 AND family_id = ?2",
            (category_id, family_id),
            |row| {
                Ok(Candidate {
                    name: row.get(0)?,
                    parent_id: row.get(1)?,
                    is_deleted: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|error| error.into())
}

/// Restore up to [MAX_BULK] soft-deleted categories at once.
///
/// Ids that are unknown, live, or name-conflicted are skipped with a
/// reason; categories whose old parent is no longer live come back at the
/// top level. All restores happen in one SQL transaction.
pub async fn bulk_restore_categories_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<BulkIdsData>,
) -> Result<Json<BulkRestoreResponse>, Error> {
    let ids = parse_ids(&form.ids);
    if ids.is_empty() {
        return Err(Error::InvalidInput("no valid ids provided".to_owned()));
    }

    let now = state.now();
    let mut connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let mut to_restore = Vec::new();
    let mut skipped = Vec::new();

    for id in ids.into_iter().take(MAX_BULK) {
        let candidate = match find_candidate(id, family_id, &connection)? {
            Some(candidate) => candidate,
            None => {
                skipped.push(SkippedItem::not_found(id));
                continue;
            }
        };

        if !candidate.is_deleted {
            skipped.push(SkippedItem::not_deleted(id, candidate.name));
            continue;
        }

        if category_name_exists(family_id, &candidate.name, Some(id), &connection)? {
            skipped.push(SkippedItem::name_conflict(id, candidate.name));
            continue;
        }

        let parent_id = match candidate.parent_id {
            Some(parent_id) => get_category(parent_id, family_id, &connection)
                .ok()
                .map(|parent| parent.id),
            None => None,
        };

        to_restore.push((id, parent_id));
    }

    let transaction = connection.transaction()?;
    for (id, parent_id) in &to_restore {
        transaction.execute(
            "UPDATE category SET deleted_at = NULL, parent_id = ?1, updated_at = ?2 WHERE id = ?3",
            (parent_id, now, id),
        )?;
    }
    transaction.commit()?;

    tracing::info!(
        "Restored {} categories ({} skipped).",
        to_restore.len(),
        skipped.len()
    );

    Ok(Json(BulkRestoreResponse {
        restored: to_restore.len(),
        skipped,
    }))
}

/// Permanently delete up to [MAX_BULK] soft-deleted categories at once,
/// detaching transactions, recurring rules and subcategories inside one
/// SQL transaction.
pub async fn bulk_purge_categories_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<BulkIdsData>,
) -> Result<Json<BulkPurgeResponse>, Error> {
    let ids = parse_ids(&form.ids);
    if ids.is_empty() {
        return Err(Error::InvalidInput("no valid ids provided".to_owned()));
    }

    let mut connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let mut to_purge = Vec::new();
    let mut skipped = Vec::new();

    for id in ids.into_iter().take(MAX_BULK) {
        match find_candidate(id, family_id, &connection)? {
            None => skipped.push(SkippedItem::not_found(id)),
            Some(candidate) if !candidate.is_deleted => {
                skipped.push(SkippedItem::not_deleted(id, candidate.name))
            }
            Some(_) => to_purge.push(id),
        }
    }

    let transaction = connection.transaction()?;
    for id in &to_purge {
        purge_category(*id, &transaction)?;
    }
    transaction.commit()?;

    tracing::info!(
        "Purged {} categories ({} skipped).",
        to_purge.len(),
        skipped.len()
    );

    Ok(Json(BulkPurgeResponse {
        purged: to_purge.len(),
        skipped,
    }))
}
