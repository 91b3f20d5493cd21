//! Family membership endpoints: create, join, leave, delete.

use axum::{Extension, Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    db::lock_database,
    family::core::{Family, get_family, insert_family},
    user::{UserRole, count_family_admins, count_family_members, get_user_by_id, set_family},
};

use super::FamilyId;

/// Form data for creating a family.
#[derive(Debug, Deserialize)]
pub struct CreateFamilyData {
    /// The display name for the new family.
    pub name: String,
}

/// Handle family creation. The caller becomes the family's admin.
pub async fn create_family_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<CreateFamilyData>,
) -> Result<impl IntoResponse, Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("family name is required".to_owned()));
    }

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;

    let user = get_user_by_id(session.user_id, &connection)?;
    if user.family_id.is_some() {
        return Err(Error::AlreadyInFamily);
    }

    let family = insert_family(name, now, &connection)?;
    set_family(user.id, Some(family.id), UserRole::Admin, now, &connection)?;

    Ok((StatusCode::CREATED, Json(family)))
}

/// Form data for joining a family.
#[derive(Debug, Deserialize)]
pub struct JoinFamilyData {
    /// The id of the family to join.
    pub family_id: FamilyId,
}

/// Handle a request to join an existing family.
///
/// The first live member of a family becomes its admin; everyone after
/// that joins as a regular member.
pub async fn join_family_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<JoinFamilyData>,
) -> Result<Json<Family>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;

    let user = get_user_by_id(session.user_id, &connection)?;
    if user.family_id.is_some() {
        return Err(Error::AlreadyInFamily);
    }

    let family = get_family(form.family_id, &connection)?;

    let role = if count_family_members(family.id, &connection)? == 0 {
        UserRole::Admin
    } else {
        UserRole::Member
    };

    set_family(user.id, Some(family.id), role, now, &connection)?;

    Ok(Json(family))
}

/// Handle a request to leave the caller's family.
///
/// Refused when the caller is the only admin of a family that still has
/// other members, since that would leave the family unmanageable.
pub async fn leave_family_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;

    let user = get_user_by_id(session.user_id, &connection)?;
    let family_id = user.family_id.ok_or(Error::NotInFamily)?;

    if user.role == UserRole::Admin
        && count_family_admins(family_id, &connection)? <= 1
        && count_family_members(family_id, &connection)? > 1
    {
        return Err(Error::LastAdmin);
    }

    set_family(user.id, None, UserRole::Member, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Handle a request to delete the caller's family.
///
/// Admin-only, and only when the caller is the last live member. All of
/// the family's data is soft-deleted in a single SQL transaction so that a
/// failure part-way cannot leave the family half-deleted.
pub async fn delete_family_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let mut connection = lock_database(&state.db_connection)?;

    let user = get_user_by_id(session.user_id, &connection)?;
    let family_id = user.family_id.ok_or(Error::NotInFamily)?;

    if user.role != UserRole::Admin {
        return Err(Error::AdminRequired);
    }

    if count_family_members(family_id, &connection)? > 1 {
        return Err(Error::FamilyNotEmpty);
    }

    let transaction = connection.transaction()?;

    transaction.execute(
        "UPDATE account SET deleted_at = ?1 WHERE family_id = ?2 AND deleted_at IS NULL",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE account_balance SET deleted_at = ?1
         WHERE deleted_at IS NULL
           AND account_id IN (SELECT id FROM account WHERE family_id = ?2)",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE category SET deleted_at = ?1 WHERE family_id = ?2 AND deleted_at IS NULL",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE tag SET deleted_at = ?1 WHERE family_id = ?2 AND deleted_at IS NULL",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE \"transaction\" SET deleted_at = ?1
         WHERE deleted_at IS NULL
           AND account_id IN (SELECT id FROM account WHERE family_id = ?2)",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE recurring_transaction SET deleted_at = ?1
         WHERE deleted_at IS NULL
           AND account_id IN (SELECT id FROM account WHERE family_id = ?2)",
        (now, family_id),
    )?;
    transaction.execute(
        "UPDATE user SET family_id = NULL, role = 'Member', updated_at = ?1 WHERE id = ?2",
        (now, user.id),
    )?;
    transaction.execute(
        "UPDATE family SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, family_id),
    )?;

    transaction.commit()?;

    Ok(StatusCode::NO_CONTENT)
}
