use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error, Timestamp,
    color::DEFAULT_COLOR,
    family::FamilyId,
    tag::domain::{Tag, TagId, TagName},
};

/// Create the tag table in the database.
pub fn create_tag_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tag_family_id ON tag(family_id)",
        (),
    )?;

    Ok(())
}

fn map_row_to_tag(row: &Row) -> Result<Tag, rusqlite::Error> {
    let name: String = row.get(2)?;

    Ok(Tag {
        id: row.get(0)?,
        family_id: row.get(1)?,
        name: TagName::new_unchecked(&name),
        color: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        deleted_at: row.get(6)?,
    })
}

const TAG_COLUMNS: &str = "id, family_id, name, color, created_at, updated_at, deleted_at";

/// Create a new tag in the database.
pub(super) fn insert_tag(
    family_id: FamilyId,
    name: &TagName,
    color: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<Tag, Error> {
    connection.execute(
        "INSERT INTO tag (family_id, name, color, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (family_id, name.as_ref(), color, now, now),
    )?;

    Ok(Tag {
        id: connection.last_insert_rowid(),
        family_id,
        name: name.clone(),
        color: color.to_owned(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live tag with `tag_id` belonging to `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such live tag exists.
pub(super) fn get_tag(
    tag_id: TagId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Tag, Error> {
    connection
        .prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tag
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NULL"
        ))?
        .query_row(&[(":id", &tag_id), (":family_id", &family_id)], map_row_to_tag)
        .map_err(|error| error.into())
}

/// Retrieve the soft-deleted tag with `tag_id` belonging to `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such deleted tag exists.
pub(super) fn get_deleted_tag(
    tag_id: TagId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Tag, Error> {
    connection
        .prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tag
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NOT NULL"
        ))?
        .query_row(&[(":id", &tag_id), (":family_id", &family_id)], map_row_to_tag)
        .map_err(|error| error.into())
}

/// List the live tags of `family_id` ordered by name.
pub(super) fn list_tags(family_id: FamilyId, connection: &Connection) -> Result<Vec<Tag>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tag
             WHERE family_id = :family_id AND deleted_at IS NULL
             ORDER BY name ASC"
        ))?
        .query_map(&[(":family_id", &family_id)], map_row_to_tag)?
        .map(|maybe_tag| maybe_tag.map_err(|error| error.into()))
        .collect()
}

/// Check whether a live tag of `family_id` already uses `name`
/// (case-insensitively), excluding `exclude_id` when given.
pub(super) fn tag_name_exists(
    family_id: FamilyId,
    name: &TagName,
    exclude_id: Option<TagId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let conflict: Option<TagId> = connection
        .query_row(
            "SELECT id FROM tag
             WHERE family_id = ?1 AND LOWER(name) = LOWER(?2) AND deleted_at IS NULL
               AND id != ?3
             LIMIT 1",
            (family_id, name.as_ref(), exclude_id.unwrap_or(0)),
            |row| row.get(0),
        )
        .optional()?;

    Ok(conflict.is_some())
}

/// Update the name and color of a tag.
pub(super) fn update_tag(
    tag_id: TagId,
    name: &TagName,
    color: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE tag SET name = ?1, color = ?2, updated_at = ?3 WHERE id = ?4",
        (name.as_ref(), color, now, tag_id),
    )?;

    Ok(())
}

/// Soft-delete a tag.
pub(super) fn soft_delete_tag(
    tag_id: TagId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE tag SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, tag_id),
    )?;

    Ok(())
}

/// Clear the soft-deletion marker on a tag.
pub(super) fn restore_tag(
    tag_id: TagId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE tag SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
        (now, tag_id),
    )?;

    Ok(())
}

/// Permanently delete a tag. The junction table rows cascade away with it.
pub(super) fn purge_tag(tag_id: TagId, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM tag WHERE id = ?1", [tag_id])?;

    Ok(())
}

/// Find the live tag of `family_id` named `name` (case-insensitively), or
/// create it with the default color.
///
/// Used when transactions and recurring rules are created with free-form
/// tag names.
pub fn find_or_create_tag(
    family_id: FamilyId,
    name: &TagName,
    now: Timestamp,
    connection: &Connection,
) -> Result<Tag, Error> {
    let existing = connection
        .prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tag
             WHERE family_id = :family_id AND LOWER(name) = LOWER(:name) AND deleted_at IS NULL"
        ))?
        .query_row(
            rusqlite::named_params! {":family_id": family_id, ":name": name.as_ref()},
            map_row_to_tag,
        )
        .optional()?;

    match existing {
        Some(tag) => Ok(tag),
        None => insert_tag(family_id, name, DEFAULT_COLOR, now, connection),
    }
}

/// Resolve a comma separated list of free-form tag names into tag ids,
/// creating missing tags on the fly. Empty entries are dropped.
pub fn resolve_tag_names(
    family_id: FamilyId,
    raw_tags: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<Vec<TagId>, Error> {
    let mut tag_ids = Vec::new();

    for part in raw_tags.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let name = TagName::new(part)?;
        let tag = find_or_create_tag(family_id, &name, now, connection)?;

        if !tag_ids.contains(&tag.id) {
            tag_ids.push(tag.id);
        }
    }

    Ok(tag_ids)
}
