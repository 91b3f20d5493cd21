//! Bulk restore and purge for soft-deleted accounts.

use axum::{Extension, Form, Json, extract::State};
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{
    Error,
    account::core::{AccountId, account_name_exists},
    app_state::DatabaseState,
    auth::session::Session,
    bulk::{BulkIdsData, MAX_BULK, SkippedItem, parse_ids},
    db::lock_database,
    family::{FamilyId, require_family},
};

/// The response body for a bulk restore of accounts.
#[derive(Debug, Serialize)]
pub struct BulkRestoreResponse {
    /// How many accounts were restored.
    pub restored: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

/// The response body for a bulk purge of accounts.
#[derive(Debug, Serialize)]
pub struct BulkPurgeResponse {
    /// How many accounts were permanently deleted.
    pub purged: usize,
    /// The ids that were skipped, with reasons.
    pub skipped: Vec<SkippedItem>,
}

fn find_candidate(
    account_id: AccountId,
    family_id: FamilyId,
    connection: &rusqlite::Connection,
) -> Result<Option<(String, bool)>, Error> {
    connection
        .query_row(
            "SELECT name, deleted_at IS NOT NULL FROM account WHERE id = ?1 AND family_id = ?2",
            (account_id, family_id),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|error| error.into())
}

/// Restore up to [MAX_BULK] soft-deleted accounts at once, skipping ids
/// that are unknown, live, or whose name is now taken by a live account.
pub async fn bulk_restore_accounts_endpoint(
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

        if account_name_exists(family_id, &name, Some(id), &connection)? {
            skipped.push(SkippedItem::name_conflict(id, name));
            continue;
        }

        connection.execute(
            "UPDATE account SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
            (now, id),
        )?;
        restored += 1;
    }

    tracing::info!("Restored {restored} accounts ({} skipped).", skipped.len());

    Ok(Json(BulkRestoreResponse { restored, skipped }))
}

/// Permanently delete up to [MAX_BULK] soft-deleted accounts at once.
///
/// Each account takes its balance snapshots, transactions and recurring
/// rules with it, all inside one SQL transaction.
pub async fn bulk_purge_accounts_endpoint(
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
        transaction.execute("DELETE FROM account_balance WHERE account_id = ?1", [id])?;
        // Deleting the rules first lets their log rows cascade away before
        // the generated transactions disappear underneath them.
        transaction.execute("DELETE FROM recurring_transaction WHERE account_id = ?1", [id])?;
        transaction.execute("DELETE FROM \"transaction\" WHERE account_id = ?1", [id])?;
        transaction.execute("DELETE FROM account WHERE id = ?1", [id])?;
    }
    transaction.commit()?;

    tracing::info!("Purged {} accounts ({} skipped).", to_purge.len(), skipped.len());

    Ok(Json(BulkPurgeResponse {
        purged: to_purge.len(),
        skipped,
    }))
}

#[cfg(test)]
mod bulk_account_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State};
    use rusqlite::Connection;

    use crate::{
        account::test_utils::insert_test_account,
        app_state::DatabaseState,
        auth::session::Session,
        bulk::BulkIdsData,
        db::initialize,
        family::FamilyId,
        transaction::{TransactionType, test_utils::insert_test_transaction},
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{bulk_purge_accounts_endpoint, bulk_restore_accounts_endpoint};

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
    async fn bulk_restore_skips_name_conflicts() {
        let (state, session, family_id) = get_test_state();
        let deleted = {
            let connection = state.db_connection.lock().unwrap();
            let deleted = insert_test_account(family_id, "Checking", &connection);
            connection
                .execute(
                    "UPDATE account SET deleted_at = ?1 WHERE id = ?2",
                    (test_now(), deleted.id),
                )
                .unwrap();
            // A live account has taken the name in the meantime.
            insert_test_account(family_id, "Checking", &connection);
            deleted
        };

        let response = bulk_restore_accounts_endpoint(
            State(state),
            Extension(session),
            Form(BulkIdsData {
                ids: deleted.id.to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.restored, 0);
        assert_eq!(response.0.skipped[0].reason, "name_conflict");
    }

    #[tokio::test]
    async fn bulk_purge_removes_account_with_its_data() {
        let (state, session, family_id) = get_test_state();
        let doomed = {
            let connection = state.db_connection.lock().unwrap();
            let doomed = insert_test_account(family_id, "Doomed", &connection);
            insert_test_transaction(doomed.id, 10.0, TransactionType::Income, &connection);
            connection
                .execute(
                    "UPDATE account SET deleted_at = ?1 WHERE id = ?2",
                    (test_now(), doomed.id),
                )
                .unwrap();
            doomed
        };

        let response = bulk_purge_accounts_endpoint(
            State(state.clone()),
            Extension(session),
            Form(BulkIdsData {
                ids: doomed.id.to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.purged, 1);

        let connection = state.db_connection.lock().unwrap();
        let accounts: i64 = connection
            .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))
            .unwrap();
        let transactions: i64 = connection
            .query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(accounts, 0);
        assert_eq!(transactions, 0);
    }

    #[tokio::test]
    async fn empty_id_list_is_rejected() {
        let (state, session, _) = get_test_state();

        let result = bulk_restore_accounts_endpoint(
            State(state),
            Extension(session),
            Form(BulkIdsData {
                ids: "abc, -1".to_owned(),
            }),
        )
        .await;

        assert!(result.is_err());
    }
}
