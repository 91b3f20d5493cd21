//! The transaction delete endpoint.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Error,
    account::{adjust_balance, upsert_daily_balance},
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::require_family,
    transaction::core::{TransactionId, get_transaction, soft_delete_transaction},
};

/// Soft-delete a transaction and reverse its effect on the account
/// balance. The tag attachments stay in place for a potential restore.
pub async fn delete_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let transaction = get_transaction(transaction_id, family_id, &connection)?;

    soft_delete_transaction(transaction_id, now, &connection)?;

    adjust_balance(
        transaction.account_id,
        -transaction.transaction_type.signed_amount(transaction.amount),
        now,
        &connection,
    )?;
    upsert_daily_balance(transaction.account_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod delete_transaction_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
    };
    use rusqlite::Connection;

    use crate::{
        Error,
        account::test_utils::insert_test_account,
        app_state::DatabaseState,
        auth::session::Session,
        db::initialize,
        family::FamilyId,
        transaction::core::{TransactionType, test_utils::insert_test_transaction},
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::delete_transaction_endpoint;

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
    async fn delete_reverses_the_balance_effect() {
        let (state, session, family_id) = get_test_state();
        let (account, transaction) = {
            let connection = state.db_connection.lock().unwrap();
            let account = insert_test_account(family_id, "Checking", &connection);
            let transaction =
                insert_test_transaction(account.id, 80.0, TransactionType::Income, &connection);
            connection
                .execute(
                    "UPDATE account SET balance = balance + 80.0 WHERE id = ?1",
                    [account.id],
                )
                .unwrap();
            (account, transaction)
        };

        delete_transaction_endpoint(State(state.clone()), Extension(session), Path(transaction.id))
            .await
            .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let balance: f64 = connection
            .query_row(
                "SELECT balance FROM account WHERE id = ?1",
                [account.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(balance, 0.0);

        let deleted_at: Option<String> = connection
            .query_row(
                "SELECT deleted_at FROM \"transaction\" WHERE id = ?1",
                [transaction.id],
                |row| row.get(0),
            )
            .unwrap();
        assert!(deleted_at.is_some());
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let (state, session, family_id) = get_test_state();
        let transaction = {
            let connection = state.db_connection.lock().unwrap();
            let account = insert_test_account(family_id, "Checking", &connection);
            insert_test_transaction(account.id, 80.0, TransactionType::Income, &connection)
        };

        delete_transaction_endpoint(
            State(state.clone()),
            Extension(session.clone()),
            Path(transaction.id),
        )
        .await
        .unwrap();

        let result =
            delete_transaction_endpoint(State(state), Extension(session), Path(transaction.id))
                .await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
