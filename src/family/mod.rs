//! Family membership: the tenancy boundary every other entity is scoped to.

mod core;
mod manage;
mod read;

pub use core::{Family, FamilyId, create_family_table, require_family};
pub use manage::{
    create_family_endpoint, delete_family_endpoint, join_family_endpoint, leave_family_endpoint,
};
pub use read::get_family_endpoint;
