//! Recurring rule CRUD endpoints.

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Timestamp,
    account::{AccountId, get_account},
    app_state::DatabaseState,
    auth::session::Session,
    category::{CategoryId, find_or_create_category, get_category},
    db::lock_database,
    family::{FamilyId, require_family},
    recurring::{
        core::{
            Frequency, NewRecurringTransaction, RecurringTransaction, RecurringTransactionId,
            get_recurring_transaction, get_rule_tag_ids, insert_recurring_transaction,
            list_recurring_transactions, set_rule_tags, soft_delete_recurring_transaction,
            update_recurring_transaction,
        },
        log::count_logged_occurrences,
    },
    tag::resolve_tag_names,
    transaction::TransactionType,
    user::UserId,
};

/// Which of the three mutually exclusive end conditions a rule form picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EndCondition {
    /// The rule never ends.
    #[serde(rename = "never")]
    Never,
    /// The rule ends at a fixed date.
    #[serde(rename = "endDate", alias = "end_date")]
    EndDate,
    /// The rule ends after a fixed number of occurrences.
    #[serde(rename = "maxOccurrences", alias = "max_occurrences")]
    MaxOccurrences,
}

/// Form data for creating and editing recurring rules.
#[derive(Debug, Deserialize)]
pub struct RecurringTransactionFormData {
    /// The account the generated transactions belong to.
    pub account_id: AccountId,
    /// An existing category to assign.
    pub category_id: Option<CategoryId>,
    /// A short description, reused as the generated transaction name.
    pub description: String,
    /// The unsigned amount of each occurrence; must be positive.
    pub amount: f64,
    /// The kind of money movement.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// How often the rule fires.
    pub frequency: Frequency,
    /// Day-of-month anchor for monthly/yearly rules (1-31).
    pub day_of_month: Option<u8>,
    /// Day-of-week anchor for weekly rules (0-6).
    pub day_of_week: Option<u8>,
    /// The time of day occurrences nominally fire, "HH:MM".
    pub time_of_day: String,
    /// The first occurrence, in any accepted timestamp format.
    pub start_date: String,
    /// Which end condition applies.
    pub end_condition: EndCondition,
    /// The end date, required when `end_condition` is `endDate`.
    pub end_date: Option<String>,
    /// The occurrence cap, required when `end_condition` is `maxOccurrences`.
    pub max_occurrences: Option<i64>,
    /// Comma separated free-form tag names.
    pub tags: Option<String>,
    /// A new category to create and assign when `category_id` is absent.
    pub new_category: Option<String>,
    /// The color for a newly created category.
    pub new_category_color: Option<String>,
}

fn resolve_form(
    form: &RecurringTransactionFormData,
    family_id: FamilyId,
    user_id: UserId,
    now: Timestamp,
    connection: &rusqlite::Connection,
) -> Result<NewRecurringTransaction, Error> {
    get_account(form.account_id, family_id, connection)?;

    let (end_date, max_occurrences) = match form.end_condition {
        EndCondition::Never => (None, None),
        EndCondition::EndDate => {
            let end_date = form.end_date.as_deref().ok_or_else(|| {
                Error::InvalidInput(
                    "end date is required when the end condition is an end date".to_owned(),
                )
            })?;

            (Some(Timestamp::parse(end_date)?), None)
        }
        EndCondition::MaxOccurrences => {
            let max_occurrences = form.max_occurrences.ok_or_else(|| {
                Error::InvalidInput(
                    "max occurrences is required when the end condition is a count".to_owned(),
                )
            })?;

            (None, Some(max_occurrences))
        }
    };

    let category_id = match (form.category_id, form.new_category.as_deref()) {
        (Some(category_id), _) => {
            get_category(category_id, family_id, connection)?;
            Some(category_id)
        }
        (None, Some(new_category)) if !new_category.trim().is_empty() => {
            let category = find_or_create_category(
                family_id,
                new_category.trim(),
                form.new_category_color.as_deref(),
                now,
                connection,
            )?;
            Some(category.id)
        }
        (None, _) => None,
    };

    let new_rule = NewRecurringTransaction {
        account_id: form.account_id,
        user_id,
        category_id,
        description: form.description.trim().to_owned(),
        amount: form.amount,
        transaction_type: form.transaction_type,
        frequency: form.frequency,
        day_of_month: form.day_of_month,
        day_of_week: form.day_of_week,
        time_of_day: form.time_of_day.clone(),
        start_date: Timestamp::parse(&form.start_date)?,
        end_date,
        max_occurrences,
    };

    new_rule.validate()?;

    Ok(new_rule)
}

/// Handle rule creation form submission.
pub async fn create_recurring_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<RecurringTransactionFormData>,
) -> Result<impl IntoResponse, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let new_rule = resolve_form(&form, family_id, session.user_id, now, &connection)?;
    let rule = insert_recurring_transaction(&new_rule, now, &connection)?;

    if let Some(raw_tags) = form.tags.as_deref() {
        let tag_ids = resolve_tag_names(family_id, raw_tags, now, &connection)?;
        set_rule_tags(rule.id, &tag_ids, &connection)?;
    }

    Ok((StatusCode::CREATED, Json(rule)))
}

/// Handle rule edit form submission.
///
/// Keeps the rule's creator and occurrence counter; everything else is
/// replaced by the validated form.
pub async fn update_recurring_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(rule_id): Path<RecurringTransactionId>,
    Form(form): Form<RecurringTransactionFormData>,
) -> Result<Json<RecurringTransaction>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let existing = get_recurring_transaction(rule_id, family_id, &connection)?;
    let new_rule = resolve_form(&form, family_id, existing.user_id, now, &connection)?;

    update_recurring_transaction(rule_id, &new_rule, now, &connection)?;

    if let Some(raw_tags) = form.tags.as_deref() {
        let tag_ids = resolve_tag_names(family_id, raw_tags, now, &connection)?;
        set_rule_tags(rule_id, &tag_ids, &connection)?;
    }

    get_recurring_transaction(rule_id, family_id, &connection).map(Json)
}

/// Soft-delete a rule. Existing generated transactions are untouched.
pub async fn delete_recurring_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(rule_id): Path<RecurringTransactionId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_recurring_transaction(rule_id, family_id, &connection)?;
    soft_delete_recurring_transaction(rule_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A rule with the bookkeeping a listing client wants alongside it.
#[derive(Debug, Serialize)]
pub struct RecurringTransactionListItem {
    /// The rule itself.
    #[serde(flatten)]
    pub rule: RecurringTransaction,
    /// The ids of the tags attached to the rule.
    pub tag_ids: Vec<crate::tag::TagId>,
    /// How many occurrences have been logged for the rule.
    pub logged_occurrences: i64,
}

/// List the family's live rules with their tags and log counts.
pub async fn list_recurring_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<RecurringTransactionListItem>>, Error> {
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let rules = list_recurring_transactions(family_id, &connection)?;
    let mut items = Vec::with_capacity(rules.len());

    for rule in rules {
        let tag_ids = get_rule_tag_ids(rule.id, &connection)?;
        let logged_occurrences = count_logged_occurrences(rule.id, &connection)?;

        items.push(RecurringTransactionListItem {
            rule,
            tag_ids,
            logged_occurrences,
        });
    }

    Ok(Json(items))
}
