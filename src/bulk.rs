//! Shared plumbing for the bulk restore/purge endpoints.

use serde::{Deserialize, Serialize};

/// The most ids a single bulk operation will process; extra ids are
/// silently dropped after deduplication.
pub const MAX_BULK: usize = 10;

/// The form data for bulk operations: a comma or whitespace separated list
/// of ids.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkIdsData {
    /// The raw id list, e.g. "1, 2 3".
    pub ids: String,
}

/// An id that a bulk operation decided not to touch, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    /// The id that was skipped.
    pub id: i64,
    /// The entity's name, when it was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Why the id was skipped: `not_found`, `not_deleted_anymore` or
    /// `name_conflict`.
    pub reason: &'static str,
}

impl SkippedItem {
    /// The id does not exist or is outside the caller's family.
    pub fn not_found(id: i64) -> Self {
        Self {
            id,
            name: None,
            reason: "not_found",
        }
    }

    /// The entity is not soft-deleted, so there is nothing to restore or
    /// purge.
    pub fn not_deleted(id: i64, name: String) -> Self {
        Self {
            id,
            name: Some(name),
            reason: "not_deleted_anymore",
        }
    }

    /// Restoring would clash with a live entity of the same name.
    pub fn name_conflict(id: i64, name: String) -> Self {
        Self {
            id,
            name: Some(name),
            reason: "name_conflict",
        }
    }
}

/// Parse a comma/whitespace separated id list, dropping duplicates and
/// anything that is not a positive integer, preserving first-seen order.
pub fn parse_ids(raw: &str) -> Vec<i64> {
    let mut ids = Vec::new();

    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Ok(id) = part.parse::<i64>()
            && id > 0
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }

    ids
}

#[cfg(test)]
mod parse_ids_tests {
    use super::parse_ids;

    #[test]
    fn parses_comma_and_whitespace_separated_ids() {
        assert_eq!(parse_ids("1, 2 3\t4"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn drops_duplicates_keeping_first_occurrence() {
        assert_eq!(parse_ids("3, 1, 3, 2, 1"), vec![3, 1, 2]);
    }

    #[test]
    fn drops_garbage_and_non_positive_ids() {
        assert_eq!(parse_ids("0, -2, abc, 7"), vec![7]);
    }

    #[test]
    fn empty_input_gives_no_ids() {
        assert_eq!(parse_ids(""), Vec::<i64>::new());
        assert_eq!(parse_ids("  ,  "), Vec::<i64>::new());
    }
}
