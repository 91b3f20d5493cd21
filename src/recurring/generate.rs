//! The batch generation endpoint driving the recurrence engine.

use axum::{Extension, Form, Json, extract::State};
use serde::Deserialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    bulk::parse_ids,
    db::lock_database,
    family::require_family,
    recurring::{
        engine::{GenerationOutcome, generate_recurring_transactions},
        schedule::Horizon,
    },
};

/// Form data for a generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateFormData {
    /// Comma or whitespace separated rule ids.
    pub recurring_transaction_ids: String,
    /// How far into the future to generate; defaults to today.
    #[serde(default)]
    pub generate_up_to: Horizon,
}

/// Materialize ledger transactions from the given rules up to the chosen
/// horizon.
///
/// Per-rule failures are reported in the response body rather than as an
/// error status, so one bad id never hides the occurrences generated for
/// the rest of the batch.
pub async fn generate_recurring_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<GenerateFormData>,
) -> Result<Json<GenerationOutcome>, Error> {
    let rule_ids = parse_ids(&form.recurring_transaction_ids);
    if rule_ids.is_empty() {
        return Err(Error::InvalidInput(
            "no valid recurring transaction ids provided".to_owned(),
        ));
    }

    let now = state.now();
    let mut connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let outcome = generate_recurring_transactions(
        &rule_ids,
        form.generate_up_to,
        family_id,
        now,
        &mut connection,
    )?;

    tracing::info!(
        "Generated {} transactions from {} rules ({} errors).",
        outcome.generated,
        rule_ids.len(),
        outcome.errors.len()
    );

    Ok(Json(outcome))
}
