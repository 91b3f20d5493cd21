//! Ledger transactions: the materialized financial entries that move
//! account balances.

mod core;
mod create;
mod delete;
mod list;
mod update;

pub use core::{
    NewTransaction, Transaction, TransactionId, TransactionType, create_transaction_table,
    create_transaction_tag_table, get_transaction, insert_transaction, set_transaction_tags,
};
pub use create::create_transaction_endpoint;
pub use delete::delete_transaction_endpoint;
pub use list::{TransactionListState, list_transactions_endpoint};
pub use update::update_transaction_endpoint;

#[cfg(test)]
pub(crate) use core::test_utils;
