//! The filtered, paginated transaction listing endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::{Connection, ToSql};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    account::AccountId,
    auth::session::Session,
    category::CategoryId,
    db::lock_database,
    family::{FamilyId, require_family},
    pagination::{Pagination, PaginationConfig},
    tag::Tag,
    transaction::core::{
        TRANSACTION_COLUMNS, Transaction, TransactionType, get_transaction_tags,
        map_row_to_transaction,
    },
    user::UserId,
};

/// The state needed for the transaction listing.
#[derive(Debug, Clone)]
pub struct TransactionListState {
    /// The database connection.
    pub db_connection: Arc<Mutex<rusqlite::Connection>>,
    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionListState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Query parameters for the transaction listing.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    /// The 1-based page to return.
    pub page: Option<u64>,
    /// The page size.
    pub limit: Option<u64>,
    /// Only transactions of this account.
    pub account_id: Option<AccountId>,
    /// Only transactions with this category.
    pub category_id: Option<CategoryId>,
    /// Only transactions of this type.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Only transactions on or after this date.
    pub start_date: Option<String>,
    /// Only transactions on or before this date.
    pub end_date: Option<String>,
}

/// A reference to a related entity, trimmed down for list rendering.
#[derive(Debug, Serialize)]
pub struct EntityRef {
    /// The entity's id.
    pub id: i64,
    /// The entity's display name.
    pub name: String,
    /// The entity's display color.
    pub color: String,
}

/// The user who recorded a transaction.
#[derive(Debug, Serialize)]
pub struct UserRef {
    /// The user's id.
    pub id: UserId,
    /// The user's display name.
    pub username: String,
}

/// A transaction joined with its account, category, user and tags.
#[derive(Debug, Serialize)]
pub struct TransactionListItem {
    /// The transaction itself.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The owning account.
    pub account: EntityRef,
    /// The assigned category, if any.
    pub category: Option<EntityRef>,
    /// The user who recorded the transaction.
    pub user: UserRef,
    /// The attached tags.
    pub tags: Vec<EntityRef>,
}

/// The response body for the transaction listing.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    /// The page of transactions.
    pub transactions: Vec<TransactionListItem>,
    /// The pagination block for the query.
    pub pagination: Pagination,
}

struct FilterClause {
    sql: String,
    params: Vec<Box<dyn ToSql>>,
}

fn build_filter(family_id: FamilyId, query: &TransactionListQuery) -> Result<FilterClause, Error> {
    let mut sql = String::from(
        " WHERE t.deleted_at IS NULL AND a.deleted_at IS NULL AND a.family_id = ?",
    );
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(family_id)];

    if let Some(account_id) = query.account_id {
        sql.push_str(" AND t.account_id = ?");
        params.push(Box::new(account_id));
    }

    if let Some(category_id) = query.category_id {
        sql.push_str(" AND t.category_id = ?");
        params.push(Box::new(category_id));
    }

    if let Some(transaction_type) = query.transaction_type {
        sql.push_str(" AND t.type = ?");
        params.push(Box::new(transaction_type));
    }

    if let Some(start_date) = query.start_date.as_deref() {
        sql.push_str(" AND t.date >= ?");
        params.push(Box::new(crate::Timestamp::parse(start_date)?));
    }

    if let Some(end_date) = query.end_date.as_deref() {
        sql.push_str(" AND t.date <= ?");
        params.push(Box::new(crate::Timestamp::parse(end_date)?));
    }

    Ok(FilterClause { sql, params })
}

fn count_transactions(filter: &FilterClause, connection: &Connection) -> Result<u64, Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM \"transaction\" t
         INNER JOIN account a ON t.account_id = a.id{}",
        filter.sql
    );
    let params: Vec<&dyn ToSql> = filter.params.iter().map(|param| param.as_ref()).collect();

    let count: i64 = connection.query_row(&sql, &params[..], |row| row.get(0))?;

    Ok(count as u64)
}

/// List the family's live transactions with optional filters, most recent
/// first, paged.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionListState>,
    Extension(session): Extension<Session>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, Error> {
    let (page, limit) = state.pagination_config.resolve(query.page, query.limit);

    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let filter = build_filter(family_id, &query)?;
    let total = count_transactions(&filter, &connection)?;

    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS}, a.name, a.color, c.name, c.color, u.username
         FROM \"transaction\" t
         INNER JOIN account a ON t.account_id = a.id
         INNER JOIN user u ON t.user_id = u.id
         LEFT JOIN category c ON t.category_id = c.id{}
         ORDER BY t.date DESC, t.created_at DESC
         LIMIT ? OFFSET ?",
        filter.sql
    );

    let mut params: Vec<&dyn ToSql> = filter.params.iter().map(|param| param.as_ref()).collect();
    let limit_param = limit as i64;
    let offset_param = PaginationConfig::offset(page, limit) as i64;
    params.push(&limit_param);
    params.push(&offset_param);

    let rows: Vec<(Transaction, String, String, Option<String>, Option<String>, String)> =
        connection
            .prepare(&sql)?
            .query_map(&params[..], |row| {
                let transaction = map_row_to_transaction(row)?;

                Ok((
                    transaction,
                    row.get(11)?,
                    row.get(12)?,
                    row.get(13)?,
                    row.get(14)?,
                    row.get(15)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

    let mut transactions = Vec::with_capacity(rows.len());

    for (transaction, account_name, account_color, category_name, category_color, username) in rows
    {
        let tags = get_transaction_tags(transaction.id, &connection)?
            .into_iter()
            .map(|tag: Tag| EntityRef {
                id: tag.id,
                name: tag.name.to_string(),
                color: tag.color,
            })
            .collect();

        let category = match (transaction.category_id, category_name, category_color) {
            (Some(id), Some(name), Some(color)) => Some(EntityRef { id, name, color }),
            _ => None,
        };

        transactions.push(TransactionListItem {
            account: EntityRef {
                id: transaction.account_id,
                name: account_name,
                color: account_color,
            },
            user: UserRef {
                id: transaction.user_id,
                username,
            },
            category,
            tags,
            transaction,
        });
    }

    Ok(Json(TransactionListResponse {
        transactions,
        pagination: Pagination::new(total, page, limit),
    }))
}

#[cfg(test)]
mod list_transactions_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Query, State},
    };
    use rusqlite::Connection;

    use crate::{
        account::test_utils::insert_test_account,
        auth::session::Session,
        db::initialize,
        family::FamilyId,
        pagination::PaginationConfig,
        transaction::core::{TransactionType, test_utils::insert_test_transaction},
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{TransactionListQuery, TransactionListState, list_transactions_endpoint};

    fn get_test_state() -> (TransactionListState, Session, FamilyId) {
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

        let state = TransactionListState {
            db_connection: Arc::new(Mutex::new(connection)),
            pagination_config: PaginationConfig::default(),
        };

        (state, session, family_id)
    }

    #[tokio::test]
    async fn lists_transactions_with_pagination() {
        let (state, session, family_id) = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            let account = insert_test_account(family_id, "Checking", &connection);
            for _ in 0..25 {
                insert_test_transaction(account.id, 10.0, TransactionType::Expense, &connection);
            }
        }

        let response = list_transactions_endpoint(
            State(state),
            Extension(session),
            Query(TransactionListQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.0.transactions.len(), 20);
        assert_eq!(response.0.pagination.total, 25);
        assert_eq!(response.0.pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn filters_by_type() {
        let (state, session, family_id) = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            let account = insert_test_account(family_id, "Checking", &connection);
            insert_test_transaction(account.id, 10.0, TransactionType::Expense, &connection);
            insert_test_transaction(account.id, 99.0, TransactionType::Income, &connection);
        }

        let response = list_transactions_endpoint(
            State(state),
            Extension(session),
            Query(TransactionListQuery {
                transaction_type: Some(TransactionType::Income),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.transactions.len(), 1);
        assert_eq!(response.0.transactions[0].transaction.amount, 99.0);
    }

    #[tokio::test]
    async fn filters_by_account() {
        let (state, session, family_id) = get_test_state();
        let second = {
            let connection = state.db_connection.lock().unwrap();
            let first = insert_test_account(family_id, "First", &connection);
            let second = insert_test_account(family_id, "Second", &connection);
            insert_test_transaction(first.id, 10.0, TransactionType::Expense, &connection);
            insert_test_transaction(second.id, 20.0, TransactionType::Expense, &connection);
            second
        };

        let response = list_transactions_endpoint(
            State(state),
            Extension(session),
            Query(TransactionListQuery {
                account_id: Some(second.id),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.transactions.len(), 1);
        assert_eq!(response.0.transactions[0].account.name, "Second");
    }

    #[tokio::test]
    async fn excludes_other_families() {
        let (state, session, _) = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            let other_family_id = insert_test_family(&connection);
            let account = insert_test_account(other_family_id, "Foreign", &connection);
            insert_test_transaction(account.id, 10.0, TransactionType::Expense, &connection);
        }

        let response = list_transactions_endpoint(
            State(state),
            Extension(session),
            Query(TransactionListQuery::default()),
        )
        .await
        .unwrap();

        assert!(response.0.transactions.is_empty());
        assert_eq!(response.0.pagination.total, 0);
    }
}
