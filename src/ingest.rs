//! The email ingestion job: fetch a source's recent emails, extract their
//! fields and record them in the ledger.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use rusqlite::Connection;
use serde_json::json;
use time::{Date, Duration, OffsetDateTime, macros::format_description};

use crate::{
    AppState, Error,
    config::IngestConfig,
    extraction::extract_fields,
    gmail::{MailClient, MailError},
    ledger::{NewLedgerEntry, get_existing_email_ids, upsert_ledger_entry},
    source::{Source, SourceId, get_source},
    timezone::get_local_offset,
    token::{TokenIssuer, refresh_access_token},
    user::{User, get_user_by_id},
};

/// The state needed for running the ingestion job.
#[derive(Clone)]
pub struct IngestState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub mail_client: Arc<dyn MailClient>,
    pub token_issuer: Arc<dyn TokenIssuer>,
    pub ingest_config: IngestConfig,
    pub local_timezone: String,
}

impl FromRef<AppState> for IngestState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            mail_client: state.mail_client.clone(),
            token_issuer: state.token_issuer.clone(),
            ingest_config: state.ingest_config.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The result of one run of the ingestion job.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The search matched no emails.
    NoEmails { query: String },
    /// Every matching email already has a ledger entry.
    AllProcessed,
    /// The IDs of the emails that were written to the ledger.
    Processed(Vec<String>),
    /// The access token had expired and was replaced, no emails were fetched.
    TokenRefreshed(Source),
}

/// A route handler that runs the ingestion job for the source in the path.
pub async fn fetch_email_endpoint(
    State(state): State<IngestState>,
    Path(source_id): Path<String>,
) -> Response {
    let Ok(source_id) = source_id.trim().parse::<SourceId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid sourceId format" })),
        )
            .into_response();
    };

    match ingest_source(source_id, &state).await {
        Ok(IngestOutcome::NoEmails { query }) => Json(json!({
            "message": format!("No emails found for query: {query}"),
            "processed": [],
        }))
        .into_response(),
        Ok(IngestOutcome::AllProcessed) => Json(json!({
            "message": "All emails already processed.",
            "processed": [],
        }))
        .into_response(),
        Ok(IngestOutcome::Processed(email_ids)) => {
            let processed = email_ids
                .into_iter()
                .map(|id| json!({ "id": id }))
                .collect::<Vec<_>>();

            Json(processed).into_response()
        }
        Ok(IngestOutcome::TokenRefreshed(source)) => {
            Json(json!({ "source": source })).into_response()
        }
        Err(Error::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Source or user not found" })),
        )
            .into_response(),
        Err(error) => error.into_json_response(),
    }
}

/// Fetch the recent emails for a source and upsert a ledger entry for each
/// email that has not been recorded yet.
///
/// If the mailbox rejects the user's access token, a new token is requested
/// and stored once and the job stops without fetching any emails.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if the source or its user does not exist,
/// - [Error::Mail] if listing the emails failed for a reason other than an expired token,
/// - [Error::TokenRefresh] if the expired token could not be replaced,
/// - [Error::InvalidTimezoneError] if the configured timezone is not valid.
pub async fn ingest_source(
    source_id: SourceId,
    state: &IngestState,
) -> Result<IngestOutcome, Error> {
    let (source, user) = load_source_and_user(source_id, &state.db_connection)?;

    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;
    let today = OffsetDateTime::now_utc().to_offset(local_offset).date();
    let query = build_search_query(
        &source.search_filter(),
        today,
        state.ingest_config.lookback_days,
    );

    let access_token = user.access_token.clone().unwrap_or_default();

    let messages = match state.mail_client.list_messages(&access_token, &query).await {
        Ok(messages) => messages,
        Err(MailError::Unauthorized) => {
            tracing::warn!(
                "Access token for user #{} was rejected, requesting a new one",
                user.id
            );
            refresh_access_token(&user, state.token_issuer.as_ref(), &state.db_connection)
                .await?;

            return Ok(IngestOutcome::TokenRefreshed(source));
        }
        Err(error) => return Err(error.into()),
    };

    if messages.is_empty() {
        tracing::info!("Source #{source_id} matched no emails for query {query:?}");
        return Ok(IngestOutcome::NoEmails { query });
    }

    let email_ids = messages
        .into_iter()
        .map(|message| message.id)
        .collect::<Vec<_>>();

    let existing_ids = {
        let connection = lock_connection(&state.db_connection)?;
        get_existing_email_ids(&email_ids, &connection)?
    };

    let new_ids = unique_new_ids(email_ids, &existing_ids);

    if new_ids.is_empty() {
        tracing::info!("All emails for source #{source_id} have already been processed");
        return Ok(IngestOutcome::AllProcessed);
    }

    let results = join_all(
        new_ids
            .iter()
            .map(|email_id| process_message(email_id, &source, &access_token, state)),
    )
    .await;

    let processed = new_ids
        .into_iter()
        .zip(results)
        .filter_map(|(email_id, result)| match result {
            Ok(()) => Some(email_id),
            Err(error) => {
                tracing::error!("Could not process email {email_id} for source #{source_id}: {error}");
                None
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        "Processed {} new email(s) for source #{source_id}",
        processed.len()
    );

    Ok(IngestOutcome::Processed(processed))
}

/// The search query for a source's emails received since `lookback_days` before `today`.
pub fn build_search_query(filter: &str, today: Date, lookback_days: u32) -> String {
    let since = today
        .checked_sub(Duration::days(i64::from(lookback_days)))
        .unwrap_or(Date::MIN);
    let since = since
        .format(format_description!("[year]/[month]/[day]"))
        .unwrap_or_default();

    let filter = filter.trim();

    if filter.is_empty() {
        format!("after:{since}")
    } else {
        format!("{filter} after:{since}")
    }
}

fn load_source_and_user(
    source_id: SourceId,
    db_connection: &Mutex<Connection>,
) -> Result<(Source, User), Error> {
    let connection = lock_connection(db_connection)?;
    let source = get_source(source_id, &connection)?;
    let user = get_user_by_id(source.user_id, &connection)?;

    Ok((source, user))
}

fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)
}

/// The IDs not in `existing_ids`, in their original order and without repeats.
fn unique_new_ids(email_ids: Vec<String>, existing_ids: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();

    email_ids
        .into_iter()
        .filter(|id| !existing_ids.contains(id) && seen.insert(id.clone()))
        .collect()
}

async fn process_message(
    email_id: &str,
    source: &Source,
    access_token: &str,
    state: &IngestState,
) -> Result<(), Error> {
    let message = state.mail_client.get_message(access_token, email_id).await?;

    let body = message.body_text();
    let extracted = extract_fields(source, &body);

    let entry = NewLedgerEntry {
        date: message.date().unwrap_or_else(OffsetDateTime::now_utc),
        email_id: email_id.to_owned(),
        email_subject: message.subject().to_owned(),
        body,
        amount_extract: extracted.amount,
        payee_extract: extracted.payee,
        category_extract: source.default_category,
        transaction_type_extract: source.default_type,
        source_id: source.id,
        user_id: source.user_id,
    };

    let connection = lock_connection(&state.db_connection)?;
    upsert_ledger_entry(&entry, &connection)?;

    Ok(())
}
