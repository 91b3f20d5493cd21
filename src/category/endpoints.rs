//! Category CRUD endpoints, including the hierarchy validation rules.

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    category::core::{
        Category, CategoryId, category_name_exists, get_category, get_deleted_category,
        has_live_children, insert_category, is_descendant, list_categories, live_transaction_count,
        purge_category, restore_category, soft_delete_category, update_category,
    },
    color::{DEFAULT_COLOR, validate_color},
    db::lock_database,
    family::{FamilyId, require_family},
};

/// Form data for creating and editing categories.
#[derive(Debug, Deserialize)]
pub struct CategoryFormData {
    /// The category name.
    pub name: String,
    /// The display color; defaults when omitted.
    pub color: Option<String>,
    /// The parent category for subcategories.
    pub parent_id: Option<CategoryId>,
}

fn validated_form(form: CategoryFormData) -> Result<(String, String, Option<CategoryId>), Error> {
    let name = form.name.trim().to_owned();
    if name.is_empty() {
        return Err(Error::InvalidInput("category name is required".to_owned()));
    }

    let color = form.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    validate_color(&color)?;

    Ok((name, color, form.parent_id))
}

fn check_parent(
    parent_id: Option<CategoryId>,
    family_id: FamilyId,
    connection: &rusqlite::Connection,
) -> Result<(), Error> {
    if let Some(parent_id) = parent_id {
        get_category(parent_id, family_id, connection)
            .map_err(|_| Error::ParentCategoryNotFound)?;
    }

    Ok(())
}

/// Handle category creation form submission.
pub async fn create_category_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<CategoryFormData>,
) -> Result<impl IntoResponse, Error> {
    let (name, color, parent_id) = validated_form(form)?;

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    if category_name_exists(family_id, &name, None, &connection)? {
        return Err(Error::DuplicateCategoryName(name));
    }

    check_parent(parent_id, family_id, &connection)?;

    let category = insert_category(family_id, &name, &color, parent_id, now, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Handle category edit form submission.
///
/// Re-parenting is rejected when it would make the category its own
/// parent or a descendant of itself.
pub async fn update_category_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(category_id): Path<CategoryId>,
    Form(form): Form<CategoryFormData>,
) -> Result<Json<Category>, Error> {
    let (name, color, parent_id) = validated_form(form)?;

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_category(category_id, family_id, &connection)?;

    if category_name_exists(family_id, &name, Some(category_id), &connection)? {
        return Err(Error::DuplicateCategoryName(name));
    }

    if let Some(parent_id) = parent_id {
        check_parent(Some(parent_id), family_id, &connection)?;

        if parent_id == category_id || is_descendant(category_id, parent_id, &connection)? {
            return Err(Error::CategoryCycle);
        }
    }

    update_category(category_id, &name, &color, parent_id, now, &connection)?;

    get_category(category_id, family_id, &connection).map(Json)
}

/// Soft-delete a category.
///
/// Refused while live subcategories or live transactions still reference
/// it, matching the order in which a client would have to clean up.
pub async fn delete_category_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_category(category_id, family_id, &connection)?;

    if has_live_children(category_id, &connection)? {
        return Err(Error::CategoryHasChildren);
    }

    if live_transaction_count(category_id, &connection)? > 0 {
        return Err(Error::CategoryInUse);
    }

    soft_delete_category(category_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted category, unless a live category took its name.
pub async fn restore_category_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(category_id): Path<CategoryId>,
) -> Result<Json<Category>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let category = get_deleted_category(category_id, family_id, &connection)?;

    if category_name_exists(family_id, &category.name, Some(category_id), &connection)? {
        return Err(Error::DuplicateCategoryName(category.name));
    }

    // A parent that is no longer live would leave the category orphaned in
    // a hidden subtree, so it is promoted to the top level instead.
    let parent_id = match category.parent_id {
        Some(parent_id) => get_category(parent_id, family_id, &connection)
            .ok()
            .map(|parent| parent.id),
        None => None,
    };

    restore_category(category_id, parent_id, now, &connection)?;

    get_category(category_id, family_id, &connection).map(Json)
}

/// Permanently delete a soft-deleted category, detaching transactions,
/// recurring rules and subcategories inside one SQL transaction.
pub async fn purge_category_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    let mut connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_deleted_category(category_id, family_id, &connection)?;

    let transaction = connection.transaction()?;
    purge_category(category_id, &transaction)?;
    transaction.commit()?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the family's live categories.
pub async fn list_categories_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    list_categories(family_id, &connection).map(Json)
}
