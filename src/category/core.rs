use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{Error, Timestamp, color::DEFAULT_COLOR, family::FamilyId};

/// Database identifier for a category.
pub type CategoryId = i64;

/// A transaction category. Categories form a hierarchy via `parent_id`;
/// the hierarchy must stay acyclic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// The id for the category.
    pub id: CategoryId,
    /// The family the category belongs to.
    pub family_id: FamilyId,
    /// The name of the category, unique among the family's live categories.
    pub name: String,
    /// The display color, e.g. "#6172F3".
    pub color: String,
    /// The parent category, if this is a subcategory.
    pub parent_id: Option<CategoryId>,
    /// When the category was created.
    pub created_at: Timestamp,
    /// When the category row was last modified.
    pub updated_at: Timestamp,
    /// When the category was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// Create the category table in the database.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            parent_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(parent_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_family_id ON category(family_id)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_parent_id ON category(parent_id)",
        (),
    )?;

    Ok(())
}

fn map_row_to_category(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        family_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        parent_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

const CATEGORY_COLUMNS: &str =
    "id, family_id, name, color, parent_id, created_at, updated_at, deleted_at";

/// Create a new category in the database.
pub(super) fn insert_category(
    family_id: FamilyId,
    name: &str,
    color: &str,
    parent_id: Option<CategoryId>,
    now: Timestamp,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (family_id, name, color, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (family_id, name, color, parent_id, now, now),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        family_id,
        name: name.to_owned(),
        color: color.to_owned(),
        parent_id,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live category with `category_id` belonging to `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such live category exists.
pub(crate) fn get_category(
    category_id: CategoryId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NULL"
        ))?
        .query_row(
            &[(":id", &category_id), (":family_id", &family_id)],
            map_row_to_category,
        )
        .map_err(|error| error.into())
}

/// Retrieve the soft-deleted category with `category_id` belonging to
/// `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such deleted category exists.
pub(super) fn get_deleted_category(
    category_id: CategoryId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NOT NULL"
        ))?
        .query_row(
            &[(":id", &category_id), (":family_id", &family_id)],
            map_row_to_category,
        )
        .map_err(|error| error.into())
}

/// List the live categories of `family_id` ordered by name.
pub(super) fn list_categories(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE family_id = :family_id AND deleted_at IS NULL
             ORDER BY name ASC"
        ))?
        .query_map(&[(":family_id", &family_id)], map_row_to_category)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Check whether a live category of `family_id` already uses `name`
/// (case-insensitively), excluding `exclude_id` when given.
pub(super) fn category_name_exists(
    family_id: FamilyId,
    name: &str,
    exclude_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let conflict: Option<CategoryId> = connection
        .query_row(
            "SELECT id FROM category
             WHERE family_id = ?1 AND LOWER(name) = LOWER(?2) AND deleted_at IS NULL
               AND id != ?3
             LIMIT 1",
            (family_id, name, exclude_id.unwrap_or(0)),
            |row| row.get(0),
        )
        .optional()?;

    Ok(conflict.is_some())
}

/// Update the name, color and parent of a category.
pub(super) fn update_category(
    category_id: CategoryId,
    name: &str,
    color: &str,
    parent_id: Option<CategoryId>,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE category SET name = ?1, color = ?2, parent_id = ?3, updated_at = ?4
         WHERE id = ?5",
        (name, color, parent_id, now, category_id),
    )?;

    Ok(())
}

/// Soft-delete a category.
pub(super) fn soft_delete_category(
    category_id: CategoryId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE category SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, category_id),
    )?;

    Ok(())
}

/// Clear the soft-deletion marker on a category, optionally re-parenting
/// it when its old parent is no longer live.
pub(super) fn restore_category(
    category_id: CategoryId,
    parent_id: Option<CategoryId>,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE category SET deleted_at = NULL, parent_id = ?1, updated_at = ?2 WHERE id = ?3",
        (parent_id, now, category_id),
    )?;

    Ok(())
}

/// Whether any live subcategory references `category_id` as its parent.
pub(super) fn has_live_children(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM category WHERE parent_id = ?1 AND deleted_at IS NULL",
        [category_id],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// How many live transactions reference `category_id`.
pub(super) fn live_transaction_count(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<i64, Error> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM \"transaction\" WHERE category_id = ?1 AND deleted_at IS NULL",
        [category_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Whether `candidate_id` sits anywhere in the live subtree rooted at
/// `category_id`. Used to reject re-parenting that would create a cycle.
pub(super) fn is_descendant(
    category_id: CategoryId,
    candidate_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    let mut frontier = vec![category_id];

    while let Some(current) = frontier.pop() {
        let children: Vec<CategoryId> = connection
            .prepare(
                "SELECT id FROM category WHERE parent_id = :parent_id AND deleted_at IS NULL",
            )?
            .query_map(&[(":parent_id", &current)], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        if children.contains(&candidate_id) {
            return Ok(true);
        }

        frontier.extend(children);
    }

    Ok(false)
}

/// Detach everything referencing `category_id` and permanently delete it.
///
/// Transactions and recurring rules lose the category, live subcategories
/// are orphaned to the top level.
pub(super) fn purge_category(
    category_id: CategoryId,
    connection: &rusqlite::Transaction,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\" SET category_id = NULL WHERE category_id = ?1",
        [category_id],
    )?;
    connection.execute(
        "UPDATE recurring_transaction SET category_id = NULL WHERE category_id = ?1",
        [category_id],
    )?;
    connection.execute(
        "UPDATE category SET parent_id = NULL WHERE parent_id = ?1",
        [category_id],
    )?;
    connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    Ok(())
}

/// Find the live category of `family_id` named `name`, or create it with
/// `color`.
///
/// Used when transactions and recurring rules are created with a new
/// category name instead of an id.
pub fn find_or_create_category(
    family_id: FamilyId,
    name: &str,
    color: Option<&str>,
    now: Timestamp,
    connection: &Connection,
) -> Result<Category, Error> {
    let existing = connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE family_id = :family_id AND LOWER(name) = LOWER(:name) AND deleted_at IS NULL"
        ))?
        .query_row(
            rusqlite::named_params! {":family_id": family_id, ":name": name},
            map_row_to_category,
        )
        .optional()?;

    match existing {
        Some(category) => Ok(category),
        None => insert_category(
            family_id,
            name,
            color.unwrap_or(DEFAULT_COLOR),
            None,
            now,
            connection,
        ),
    }
}
