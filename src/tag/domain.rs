//! Core tag domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Timestamp, family::FamilyId};

/// A validated, non-empty tag name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TagName(String);

impl TagName {
    /// Create a tag name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidInput] if `name` is an
    /// empty string after trimming.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::InvalidInput("tag name cannot be empty".to_owned()))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a tag name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TagName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagName::new(s)
    }
}

impl Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier for a tag.
pub type TagId = i64;

/// A label for grouping transactions across accounts and categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    /// The id for the tag.
    pub id: TagId,
    /// The family the tag belongs to.
    pub family_id: FamilyId,
    /// The validated tag name.
    pub name: TagName,
    /// The display color, e.g. "#6172F3".
    pub color: String,
    /// When the tag was created.
    pub created_at: Timestamp,
    /// When the tag row was last modified.
    pub updated_at: Timestamp,
    /// When the tag was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}
