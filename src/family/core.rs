use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{
    Error, Timestamp,
    user::{UserId, UserRole, get_user_by_id},
};

/// Database identifier for a family.
pub type FamilyId = i64;

/// A group of users sharing accounts, categories, tags and transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Family {
    /// The id for the family.
    pub id: FamilyId,
    /// The display name of the family.
    pub name: String,
    /// When the family was created.
    pub created_at: Timestamp,
    /// When the family row was last modified.
    pub updated_at: Timestamp,
    /// When the family was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// Create the family table in the database.
pub fn create_family_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS family (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_family(row: &Row) -> Result<Family, rusqlite::Error> {
    Ok(Family {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        deleted_at: row.get(4)?,
    })
}

/// Create a new family in the database.
pub(super) fn insert_family(
    name: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<Family, Error> {
    connection.execute(
        "INSERT INTO family (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
        (name, now, now),
    )?;

    Ok(Family {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live family with `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no live family has `family_id`.
pub(super) fn get_family(family_id: FamilyId, connection: &Connection) -> Result<Family, Error> {
    connection
        .prepare(
            "SELECT id, name, created_at, updated_at, deleted_at FROM family
             WHERE id = :id AND deleted_at IS NULL",
        )?
        .query_row(&[(":id", &family_id)], map_row_to_family)
        .map_err(|error| error.into())
}

/// Resolve the family scope for `user_id`.
///
/// Every entity handler calls this before touching family-scoped data.
///
/// # Errors
/// Returns [Error::NotInFamily] if the user does not belong to a family.
pub fn require_family(
    user_id: UserId,
    connection: &Connection,
) -> Result<(FamilyId, UserRole), Error> {
    let user = get_user_by_id(user_id, connection)?;

    match user.family_id {
        Some(family_id) => Ok((family_id, user.role)),
        None => Err(Error::NotInFamily),
    }
}
