//! Manual correction of a ledger entry from the ledger page.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    alert::Alert,
    ledger::{LedgerEdit, LedgerId, update_ledger_entry_manually},
};

/// The state needed for editing a ledger entry.
#[derive(Debug, Clone)]
pub struct EditLedgerEntryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditLedgerEntryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Save a user's edit of a ledger entry and mark the entry as manually set.
///
/// Responds with an alert describing the outcome.
pub async fn edit_ledger_entry_endpoint(
    State(state): State<EditLedgerEntryState>,
    Path(ledger_id): Path<LedgerId>,
    Form(edit): Form<LedgerEdit>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_ledger_entry_manually(ledger_id, &edit, &connection) {
        Ok(entry) => {
            tracing::info!("Ledger entry #{ledger_id} was edited manually");

            Alert::Success {
                message: "Ledger entry updated".to_owned(),
                details: format!(
                    "\"{}\" is now marked as {}.",
                    entry.email_subject, entry.status
                ),
            }
            .into_response()
        }
        Err(error) => error.into_alert_response(),
    }
}
