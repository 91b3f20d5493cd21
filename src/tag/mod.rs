//! Tags: free-form labels attached to transactions and recurring rules.

mod bulk;
mod db;
mod domain;
mod endpoints;

pub use bulk::{bulk_purge_tags_endpoint, bulk_restore_tags_endpoint};
pub use db::{create_tag_table, find_or_create_tag, resolve_tag_names};
pub use domain::{Tag, TagId, TagName};
pub use endpoints::{
    create_tag_endpoint, delete_tag_endpoint, list_tags_endpoint, purge_tag_endpoint,
    restore_tag_endpoint, update_tag_endpoint,
};

#[cfg(test)]
pub(crate) use db::test_utils;
