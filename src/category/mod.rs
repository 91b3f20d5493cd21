//! Categories: a per-family hierarchy for classifying transactions.

mod bulk;
mod core;
mod endpoints;

pub use bulk::{bulk_purge_categories_endpoint, bulk_restore_categories_endpoint};
pub use core::{Category, CategoryId, create_category_table, find_or_create_category};
pub(crate) use core::get_category;

#[cfg(test)]
pub(crate) use core::test_utils;
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, list_categories_endpoint,
    purge_category_endpoint, restore_category_endpoint, update_category_endpoint,
};
