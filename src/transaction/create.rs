//! The transaction creation endpoint.

use axum::{Extension, Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::{
    Error, Timestamp,
    account::{AccountId, adjust_balance, get_account, upsert_daily_balance},
    app_state::DatabaseState,
    auth::session::Session,
    category::{CategoryId, find_or_create_category},
    db::lock_database,
    family::{FamilyId, require_family},
    tag::resolve_tag_names,
    transaction::core::{
        NewTransaction, Transaction, TransactionType, insert_transaction, set_transaction_tags,
    },
};

/// Form data for creating and editing transactions.
#[derive(Debug, Deserialize)]
pub struct TransactionFormData {
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// An existing category to assign.
    pub category_id: Option<CategoryId>,
    /// When the transaction happened, in any accepted timestamp format.
    pub date: String,
    /// A short description of the transaction.
    pub name: String,
    /// The unsigned amount of money moved; must be positive.
    pub amount: f64,
    /// The kind of money movement.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Comma separated free-form tag names.
    pub tags: Option<String>,
    /// A new category to create and assign when `category_id` is absent.
    pub new_category: Option<String>,
    /// The color for a newly created category.
    pub new_category_color: Option<String>,
}

/// Validate the shared parts of the transaction form and resolve the
/// category, creating a new one when asked to.
pub(super) fn resolve_form(
    form: &TransactionFormData,
    family_id: FamilyId,
    user_id: crate::user::UserId,
    now: Timestamp,
    connection: &rusqlite::Connection,
) -> Result<NewTransaction, Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "transaction name is required".to_owned(),
        ));
    }

    if !form.amount.is_finite() || form.amount <= 0.0 {
        return Err(Error::InvalidInput(
            "amount must be a positive number".to_owned(),
        ));
    }

    let date = Timestamp::parse(&form.date)?;

    get_account(form.account_id, family_id, connection)?;

    let category_id = match (form.category_id, form.new_category.as_deref()) {
        (Some(category_id), _) => {
            crate::category::get_category(category_id, family_id, connection)?;
            Some(category_id)
        }
        (None, Some(new_category)) if !new_category.trim().is_empty() => {
            let category = find_or_create_category(
                family_id,
                new_category.trim(),
                form.new_category_color.as_deref(),
                now,
                connection,
            )?;
            Some(category.id)
        }
        (None, _) => None,
    };

    Ok(NewTransaction {
        account_id: form.account_id,
        user_id,
        category_id,
        date,
        name: name.to_owned(),
        amount: form.amount,
        transaction_type: form.transaction_type,
    })
}

/// Handle transaction creation form submission.
///
/// Creates the ledger row, attaches tags (creating missing ones), applies
/// the signed amount to the account balance and refreshes the daily
/// snapshot.
pub async fn create_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<TransactionFormData>,
) -> Result<impl IntoResponse, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let new_transaction = resolve_form(&form, family_id, session.user_id, now, &connection)?;

    let transaction: Transaction = insert_transaction(&new_transaction, now, &connection)?;

    if let Some(raw_tags) = form.tags.as_deref() {
        let tag_ids = resolve_tag_names(family_id, raw_tags, now, &connection)?;
        set_transaction_tags(transaction.id, &tag_ids, &connection)?;
    }

    adjust_balance(
        transaction.account_id,
        transaction.transaction_type.signed_amount(transaction.amount),
        now,
        &connection,
    )?;
    upsert_daily_balance(transaction.account_id, now, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod create_transaction_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State};
    use rusqlite::Connection;

    use crate::{
        Error,
        account::test_utils::insert_test_account,
        app_state::DatabaseState,
        auth::session::Session,
        db::initialize,
        family::FamilyId,
        transaction::core::TransactionType,
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{TransactionFormData, create_transaction_endpoint};

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

    fn base_form(account_id: i64) -> TransactionFormData {
        TransactionFormData {
            account_id,
            category_id: None,
            date: "2024-06-01 10:00:00".to_owned(),
            name: "groceries run".to_owned(),
            amount: 42.5,
            transaction_type: TransactionType::Expense,
            tags: None,
            new_category: None,
            new_category_color: None,
        }
    }

    #[tokio::test]
    async fn create_expense_debits_the_account() {
        let (state, session, family_id) = get_test_state();
        let account = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_account(family_id, "Checking", &connection)
        };

        create_transaction_endpoint(
            State(state.clone()),
            Extension(session),
            Form(base_form(account.id)),
        )
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
        assert_eq!(balance, -42.5);
    }

    #[tokio::test]
    async fn create_with_new_category_and_tags() {
        let (state, session, family_id) = get_test_state();
        let account = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_account(family_id, "Checking", &connection)
        };

        let mut form = base_form(account.id);
        form.new_category = Some("Food".to_owned());
        form.tags = Some("weekly, market".to_owned());

        create_transaction_endpoint(State(state.clone()), Extension(session), Form(form))
            .await
            .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let categories: i64 = connection
            .query_row("SELECT COUNT(*) FROM category", [], |row| row.get(0))
            .unwrap();
        let tag_links: i64 = connection
            .query_row("SELECT COUNT(*) FROM transaction_tag", [], |row| row.get(0))
            .unwrap();
        assert_eq!(categories, 1);
        assert_eq!(tag_links, 2);
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let (state, session, family_id) = get_test_state();
        let account = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_account(family_id, "Checking", &connection)
        };

        let mut form = base_form(account.id);
        form.amount = -5.0;

        let result =
            create_transaction_endpoint(State(state), Extension(session), Form(form)).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn rejects_account_of_another_family() {
        let (state, session, _) = get_test_state();
        let foreign_account = {
            let connection = state.db_connection.lock().unwrap();
            let other_family_id = insert_test_family(&connection);
            insert_test_account(other_family_id, "Foreign", &connection)
        };

        let result = create_transaction_endpoint(
            State(state),
            Extension(session),
            Form(base_form(foreign_account.id)),
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
