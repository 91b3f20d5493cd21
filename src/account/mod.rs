//! Accounts: the money containers transactions are recorded against, plus
//! their daily balance snapshots.

mod balance;
mod bulk;
mod core;
mod create;
mod delete;
mod list;
mod update;

pub use balance::{
    create_account_balance_table, recalculate_balance_endpoint, update_daily_balance_endpoint,
    upsert_daily_balance,
};
pub use bulk::{bulk_purge_accounts_endpoint, bulk_restore_accounts_endpoint};
pub use core::{
    Account, AccountId, AccountType, adjust_balance, create_account_table, get_account,
};
pub use create::create_account_endpoint;
pub use delete::{delete_account_endpoint, restore_account_endpoint};
pub use list::list_accounts_endpoint;
pub use update::update_account_endpoint;

#[cfg(test)]
pub(crate) use core::test_utils;
