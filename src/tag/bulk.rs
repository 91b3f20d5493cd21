//! Bulk restore and purge for soft-deleted tags.

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
    tag::{
        db::{restore_tag, tag_name_exists},
        domain::{TagId, TagName},
    },
};

/// The response body for a bulk restore of tags.
#[derive(Debug, Serialize)]
pub struct BulkRestoreResponse {
    /// How many tags were restored.
    pub restored: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

/// The response body for a bulk purge of tags.
#[derive(Debug, Serialize)]
pub struct BulkPurgeResponse {
    /// How many tags were permanently deleted.
    pub purged: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

fn find_candidate(
    tag_id: TagId,
    family_id: FamilyId,
    connection: &rusqlite::Connection,
) -> Result<Option<(String, bool)>, Error> {
    connection
        .query_row(
            "SELECT name, deleted_at IS NOT NULL FROM tag WHERE id = ?1 AND family_id = ?2",
            (tag_id, family_id),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|error| error.into())
}

/// Restore up to [MAX_BULK] soft-deleted tags at once, skipping ids that
/// are unknown, live, or whose name is now taken by a live tag.
pub async fn bulk_restore_tags_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<BulkIdsData>,
) -> Result<Json<BulkRestoreResponse>, Error> {
    let ids = parse_ids(&form.ids);
    if ids.is_empty() {
        return Err(Error::InvalidInput("no valid ids provided".to_owned()));
    }

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let mut restored = 0;
    let mut skipped = Vec::new();

    for id in ids.into_iter().take(MAX_BULK) {
        let (name, is_deleted) = match find_candidate(id, family_id, &connection)? {
            Some(candidate) => candidate,
            None => {
                skipped.push(SkippedItem::not_found(id));
                continue;
            }
        };

        if !is_deleted {
            skipped.push(SkippedItem::not_deleted(id, name));
            continue;
        }

        if tag_name_exists(family_id, &TagName::new_unchecked(&name), Some(id), &connection)? {
            skipped.push(SkippedItem::name_conflict(id, name));
            continue;
        }

        restore_tag(id, now, &connection)?;
        restored += 1;
    }

    tracing::info!("Restored {restored} tags ({} skipped).", skipped.len());

    Ok(Json(BulkRestoreResponse { restored, skipped }))
}

/// Permanently delete up to [MAX_BULK] soft-deleted tags at once. Junction
/// rows cascade away with each tag.
pub async fn bulk_purge_tags_endpoint(
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
            Some((name, false)) => skipped.push(SkippedItem::not_deleted(id, name)),
            Some((_, true)) => to_purge.push(id),
        }
    }

    let transaction = connection.transaction()?;
    for id in &to_purge {
        transaction.execute("DELETE FROM tag WHERE id = ?1", [id])?;
    }
    transaction.commit()?;

    tracing::info!("Purged {} tags ({} skipped).", to_purge.len(), skipped.len());

    Ok(Json(BulkPurgeResponse {
        purged: to_purge.len(),
        skipped,
    }))
}

#[cfg(test)]
mod bulk_tag_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State};
    use rusqlite::Connection;

    use crate::{
        app_state::DatabaseState,
        auth::session::Session,
        bulk::BulkIdsData,
        db::initialize,
        family::FamilyId,
        tag::db::test_utils::insert_test_tag,
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{bulk_purge_tags_endpoint, bulk_restore_tags_endpoint};

    fn get_test_state() -> (DatabaseState, Session, FamilyId) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");

        let family_id = insert_test_family(&connection);
        let user = insert_test_user("tester@example.com", &connection);
        set_family(user.id, Some(family_id), UserRole::Admin, test_now(), &connection).unwrap();

        let session = Session {
            id: "test-session".to_owned(),
            user_id: user.id,
            username: "tester".to_owned(),
            email: "tester@example.com".to_owned(),
            created_at: test_now(),
            fingerprint: "fp".to_owned(),
            csrf_token: "token".to_owned(),
            long_lived: false,
        };

        let state = DatabaseState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, session, family_id)
    }

    #[tokio::test]
    async fn bulk_restore_reports_skips() {
        let (state, session, family_id) = get_test_state();
        let (deleted, live) = {
            let connection = state.db_connection.lock().unwrap();
            let deleted = insert_test_tag(family_id, "deleted", &connection);
            connection
                .execute(
                    "UPDATE tag SET deleted_at = ?1 WHERE id = ?2",
                    (test_now(), deleted.id),
                )
                .unwrap();
            let live = insert_test_tag(family_id, "live", &connection);
            (deleted, live)
        };

        let response = bulk_restore_tags_endpoint(
            State(state),
            Extension(session),
            Form(BulkIdsData {
                ids: format!("{}, {}, 999", deleted.id, live.id),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.restored, 1);
        let reasons: Vec<&str> = response.0.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(reasons, ["not_deleted_anymore", "not_found"]);
    }

    #[tokio::test]
    async fn bulk_purge_removes_only_deleted_tags() {
        let (state, session, family_id) = get_test_state();
        let (deleted, live) = {
            let connection = state.db_connection.lock().unwrap();
            let deleted = insert_test_tag(family_id, "deleted", &connection);
            connection
                .execute(
                    "UPDATE tag SET deleted_at = ?1 WHERE id = ?2",
                    (test_now(), deleted.id),
                )
                .unwrap();
            let live = insert_test_tag(family_id, "live", &connection);
            (deleted, live)
        };

        let response = bulk_purge_tags_endpoint(
            State(state.clone()),
            Extension(session),
            Form(BulkIdsData {
                ids: format!("{}, {}", deleted.id, live.id),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.purged, 1);
        assert_eq!(response.0.skipped.len(), 1);

        let connection = state.db_connection.lock().unwrap();
        let remaining: i64 = connection
            .query_row("SELECT COUNT(*) FROM tag", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
