//! The account creation endpoint.

use axum::{Extension, Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::{
    Error,
    account::{
        balance::upsert_daily_balance,
        core::{AccountType, account_name_exists, insert_account},
    },
    app_state::DatabaseState,
    auth::session::Session,
    color::{DEFAULT_COLOR, validate_color},
    db::lock_database,
    family::require_family,
    transaction::{NewTransaction, TransactionType, insert_transaction},
};

/// Form data for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountData {
    /// The account name.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The display color; defaults when omitted.
    pub color: Option<String>,
    /// The opening balance; defaults to zero.
    pub initial_balance: Option<f64>,
}

/// Handle account creation form submission.
///
/// A non-zero opening balance is also recorded as an "Initial Balance"
/// ledger transaction so that the transaction history explains the
/// account's starting point.
pub async fn create_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<CreateAccountData>,
) -> Result<impl IntoResponse, Error> {
    let name = form.name.trim().to_owned();
    if name.is_empty() {
        return Err(Error::InvalidInput("account name is required".to_owned()));
    }

    let color = form.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    validate_color(&color)?;

    let initial_balance = form.initial_balance.unwrap_or(0.0);

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    if account_name_exists(family_id, &name, None, &connection)? {
        return Err(Error::DuplicateAccountName(name));
    }

    let account = insert_account(
        family_id,
        &name,
        form.account_type,
        initial_balance,
        &color,
        now,
        &connection,
    )?;

    upsert_daily_balance(account.id, now, &connection)?;

    if initial_balance != 0.0 {
        let transaction_type = if initial_balance >= 0.0 {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };

        insert_transaction(
            &NewTransaction {
                account_id: account.id,
                user_id: session.user_id,
                category_id: None,
                date: now,
                name: "Initial Balance".to_owned(),
                amount: initial_balance.abs(),
                transaction_type,
            },
            now,
            &connection,
        )?;
    }

    Ok((StatusCode::CREATED, Json(account)))
}

#[cfg(test)]
mod create_account_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State};
    use rusqlite::Connection;

    use crate::{
        Error,
        account::core::AccountType,
        app_state::DatabaseState,
        auth::session::Session,
        db::initialize,
        family::FamilyId,
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{CreateAccountData, create_account_endpoint};

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
    async fn create_account_with_opening_balance_writes_initial_transaction() {
        let (state, session, _) = get_test_state();

        let result = create_account_endpoint(
            State(state.clone()),
            Extension(session),
            Form(CreateAccountData {
                name: "Checking".to_owned(),
                account_type: AccountType::Checking,
                color: None,
                initial_balance: Some(1500.0),
            }),
        )
        .await;

        assert!(result.is_ok());

        let connection = state.db_connection.lock().unwrap();
        let (name, amount, transaction_type): (String, f64, String) = connection
            .query_row(
                "SELECT name, amount, type FROM \"transaction\"",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(name, "Initial Balance");
        assert_eq!(amount, 1500.0);
        assert_eq!(transaction_type, "Income");

        let snapshots: i64 = connection
            .query_row("SELECT COUNT(*) FROM account_balance", [], |row| row.get(0))
            .unwrap();
        assert_eq!(snapshots, 1);
    }

    #[tokio::test]
    async fn zero_opening_balance_writes_no_transaction() {
        let (state, session, _) = get_test_state();

        create_account_endpoint(
            State(state.clone()),
            Extension(session),
            Form(CreateAccountData {
                name: "Empty".to_owned(),
                account_type: AccountType::Savings,
                color: None,
                initial_balance: None,
            }),
        )
        .await
        .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let transactions: i64 = connection
            .query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(transactions, 0);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (state, session, _) = get_test_state();
        let form = || {
            Form(CreateAccountData {
                name: "Checking".to_owned(),
                account_type: AccountType::Checking,
                color: None,
                initial_balance: None,
            })
        };

        create_account_endpoint(State(state.clone()), Extension(session.clone()), form())
            .await
            .unwrap();

        let result = create_account_endpoint(State(state), Extension(session), form()).await;

        assert!(matches!(result, Err(Error::DuplicateAccountName(_))));
    }

    #[tokio::test]
    async fn negative_opening_balance_is_recorded_as_expense() {
        let (state, session, _) = get_test_state();

        create_account_endpoint(
            State(state.clone()),
            Extension(session),
            Form(CreateAccountData {
                name: "Credit Card".to_owned(),
                account_type: AccountType::CreditCard,
                color: None,
                initial_balance: Some(-250.0),
            }),
        )
        .await
        .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let (amount, transaction_type): (f64, String) = connection
            .query_row("SELECT amount, type FROM \"transaction\"", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(amount, 250.0);
        assert_eq!(transaction_type, "Expense");
    }
}
