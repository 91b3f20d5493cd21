//! Recurring transactions: rules that describe a repeating money movement
//! and the engine that expands them into concrete ledger transactions.

mod core;
mod endpoints;
mod engine;
mod generate;
mod log;
mod schedule;

pub use core::{
    Frequency, RecurringTransaction, RecurringTransactionId, create_recurring_transaction_table,
    create_recurring_transaction_tag_table,
};
pub use endpoints::{
    create_recurring_transaction_endpoint, delete_recurring_transaction_endpoint,
    list_recurring_transactions_endpoint, update_recurring_transaction_endpoint,
};
pub use engine::{GenerationOutcome, generate_recurring_transactions};
pub use generate::generate_recurring_transactions_endpoint;
pub use log::create_recurring_transaction_log_table;
pub use schedule::Horizon;
