//! The recurring-transaction generation engine.
//!
//! Given a batch of rule ids and a horizon, the engine walks each rule's
//! occurrence dates from its start timestamp up to the horizon target and
//! materializes the occurrences that are not logged yet. Each occurrence
//! is materialized inside its own SQL transaction: the log-row claim, the
//! ledger insert, the tag attachments, the balance update and the counter
//! increment either all land or none do.

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error, Timestamp,
    account::adjust_balance,
    family::FamilyId,
    recurring::{
        core::{
            RecurringTransaction, RecurringTransactionId, get_recurring_transaction,
            get_rule_tag_ids, increment_occurrences,
        },
        log::{claim_occurrence, set_generated_transaction},
        schedule::{Horizon, occurrence_at},
    },
    tag::TagId,
    transaction::{NewTransaction, insert_transaction, set_transaction_tags},
};

/// What a generation run produced.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct GenerationOutcome {
    /// How many ledger transactions were materialized across the batch.
    pub generated: usize,
    /// One entry per rule that could not be processed; the rest of the
    /// batch is unaffected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Materialize the occurrences of `rule_ids` up to `horizon`, scoped to
/// `family_id`.
///
/// Rules that are missing, deleted or outside the family are reported in
/// the outcome's errors, as is a rule whose materialization fails
/// part-way; neither aborts the batch nor rolls back other rules. A rule
/// whose start date lies in the future is skipped silently.
pub fn generate_recurring_transactions(
    rule_ids: &[RecurringTransactionId],
    horizon: Horizon,
    family_id: FamilyId,
    now: Timestamp,
    connection: &mut Connection,
) -> Result<GenerationOutcome, Error> {
    let target = horizon.target(now);
    let mut outcome = GenerationOutcome::default();

    for &rule_id in rule_ids {
        let rule = match get_recurring_transaction(rule_id, family_id, connection) {
            Ok(rule) => rule,
            Err(Error::NotFound) => {
                outcome
                    .errors
                    .push(format!("recurring transaction {rule_id} not found"));
                continue;
            }
            Err(error) => return Err(error),
        };

        if rule.start_date > now {
            continue;
        }

        match generate_for_rule(&rule, target, now, connection) {
            Ok(generated) => outcome.generated += generated,
            Err(error) => {
                tracing::error!(
                    "error generating transactions for recurring transaction {rule_id}: {error}"
                );
                outcome.errors.push(format!(
                    "failed to generate transactions for recurring transaction {rule_id}"
                ));
            }
        }
    }

    Ok(outcome)
}

/// Walk one rule's occurrences up to `target`, stopping at the first of
/// end date exceeded, max occurrences reached, or horizon exceeded.
fn generate_for_rule(
    rule: &RecurringTransaction,
    target: Timestamp,
    now: Timestamp,
    connection: &mut Connection,
) -> Result<usize, Error> {
    let tag_ids = get_rule_tag_ids(rule.id, connection)?;
    let mut occurrences_count = rule.occurrences_count;
    let mut generated = 0;

    for index in 0..i32::MAX {
        let occurrence = occurrence_at(rule.start_date, rule.frequency, index);

        if occurrence > target {
            break;
        }

        if let Some(end_date) = rule.end_date
            && occurrence > end_date
        {
            break;
        }

        if let Some(max_occurrences) = rule.max_occurrences
            && occurrences_count >= max_occurrences
        {
            break;
        }

        if materialize_occurrence(rule, &tag_ids, occurrence, now, connection)? {
            generated += 1;
            occurrences_count += 1;
        }
    }

    Ok(generated)
}

/// Materialize a single occurrence, atomically.
///
/// Returns false when the occurrence was already logged, in which case
/// nothing is written and the walk simply advances.
fn materialize_occurrence(
    rule: &RecurringTransaction,
    tag_ids: &[TagId],
    occurrence: Timestamp,
    now: Timestamp,
    connection: &mut Connection,
) -> Result<bool, Error> {
    let sql_transaction = connection.transaction()?;

    let log_id = match claim_occurrence(rule.id, occurrence, now, &sql_transaction)? {
        Some(log_id) => log_id,
        None => return Ok(false),
    };

    let transaction = insert_transaction(
        &NewTransaction {
            account_id: rule.account_id,
            user_id: rule.user_id,
            category_id: rule.category_id,
            date: occurrence,
            name: format!("{} (Recurring)", rule.description),
            amount: rule.amount,
            transaction_type: rule.transaction_type,
        },
        now,
        &sql_transaction,
    )?;

    if !tag_ids.is_empty() {
        set_transaction_tags(transaction.id, tag_ids, &sql_transaction)?;
    }

    adjust_balance(
        rule.account_id,
        rule.transaction_type.signed_amount(rule.amount),
        now,
        &sql_transaction,
    )?;

    set_generated_transaction(log_id, transaction.id, now, &sql_transaction)?;
    increment_occurrences(rule.id, now, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(true)
}
