//! Application router configuration with protected and unprotected route
//! definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::{
    AppState,
    account::{
        bulk_purge_accounts_endpoint, bulk_restore_accounts_endpoint, create_account_endpoint,
        delete_account_endpoint, list_accounts_endpoint, recalculate_balance_endpoint,
        restore_account_endpoint, update_account_endpoint, update_daily_balance_endpoint,
    },
    auth::{auth_guard, change_password, csrf_guard, post_log_in, post_log_out, register_user},
    category::{
        bulk_purge_categories_endpoint, bulk_restore_categories_endpoint,
        create_category_endpoint, delete_category_endpoint, list_categories_endpoint,
        purge_category_endpoint, restore_category_endpoint, update_category_endpoint,
    },
    endpoints,
    family::{
        create_family_endpoint, delete_family_endpoint, get_family_endpoint,
        join_family_endpoint, leave_family_endpoint,
    },
    health::get_health,
    recurring::{
        create_recurring_transaction_endpoint, delete_recurring_transaction_endpoint,
        generate_recurring_transactions_endpoint, list_recurring_transactions_endpoint,
        update_recurring_transaction_endpoint,
    },
    tag::{
        bulk_purge_tags_endpoint, bulk_restore_tags_endpoint, create_tag_endpoint,
        delete_tag_endpoint, list_tags_endpoint, purge_tag_endpoint, restore_tag_endpoint,
        update_tag_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, list_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in));

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(endpoints::CHANGE_PASSWORD, post(change_password))
        .route(endpoints::FAMILIES, post(create_family_endpoint))
        .route(
            endpoints::FAMILY,
            get(get_family_endpoint).delete(delete_family_endpoint),
        )
        .route(endpoints::JOIN_FAMILY, post(join_family_endpoint))
        .route(endpoints::LEAVE_FAMILY, post(leave_family_endpoint))
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            put(update_account_endpoint).delete(delete_account_endpoint),
        )
        .route(endpoints::RESTORE_ACCOUNT, post(restore_account_endpoint))
        .route(
            endpoints::BULK_RESTORE_ACCOUNTS,
            post(bulk_restore_accounts_endpoint),
        )
        .route(
            endpoints::BULK_PURGE_ACCOUNTS,
            post(bulk_purge_accounts_endpoint),
        )
        .route(
            endpoints::RECALCULATE_ACCOUNT,
            post(recalculate_balance_endpoint),
        )
        .route(
            endpoints::ACCOUNT_DAILY_BALANCE,
            post(update_daily_balance_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(endpoints::RESTORE_CATEGORY, post(restore_category_endpoint))
        .route(endpoints::PURGE_CATEGORY, delete(purge_category_endpoint))
        .route(
            endpoints::BULK_RESTORE_CATEGORIES,
            post(bulk_restore_categories_endpoint),
        )
        .route(
            endpoints::BULK_PURGE_CATEGORIES,
            post(bulk_purge_categories_endpoint),
        )
        .route(
            endpoints::TAGS,
            get(list_tags_endpoint).post(create_tag_endpoint),
        )
        .route(
            endpoints::TAG,
            put(update_tag_endpoint).delete(delete_tag_endpoint),
        )
        .route(endpoints::RESTORE_TAG, post(restore_tag_endpoint))
        .route(endpoints::PURGE_TAG, delete(purge_tag_endpoint))
        .route(endpoints::BULK_RESTORE_TAGS, post(bulk_restore_tags_endpoint))
        .route(endpoints::BULK_PURGE_TAGS, post(bulk_purge_tags_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::RECURRING_TRANSACTIONS,
            get(list_recurring_transactions_endpoint)
                .post(create_recurring_transaction_endpoint),
        )
        .route(
            endpoints::RECURRING_TRANSACTION,
            put(update_recurring_transaction_endpoint)
                .delete(delete_recurring_transaction_endpoint),
        )
        .route(
            endpoints::GENERATE_RECURRING,
            post(generate_recurring_transactions_endpoint),
        )
        // The CSRF guard reads the session that the auth guard inserts, so
        // the auth layer must be the outer one.
        .layer(middleware::from_fn(csrf_guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The JSON 404 response for unknown routes.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}
