//! Implements a struct that holds the state of the server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    config::IngestConfig,
    db::initialize,
    gmail::{GmailClient, MailClient},
    token::{HttpTokenIssuer, TokenIssuer},
};

/// The state of the server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Reads the users' mailboxes.
    pub mail_client: Arc<dyn MailClient>,

    /// Issues new access tokens when a stored token has expired.
    pub token_issuer: Arc<dyn TokenIssuer>,

    /// Settings for the email ingestion job.
    pub ingest_config: IngestConfig,

    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection and HTTP
    /// clients for the services in `ingest_config`.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Asia/Kolkata".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        ingest_config: IngestConfig,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        let mail_client = Arc::new(GmailClient::new(ingest_config.gmail_base_url.as_str()));
        let token_issuer = Arc::new(HttpTokenIssuer::new(ingest_config.token_base_url.as_str()));

        Self::with_clients(
            db_connection,
            mail_client,
            token_issuer,
            ingest_config,
            local_timezone,
        )
    }

    /// Create a new [AppState] with the given mail client and token issuer.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn with_clients(
        db_connection: Connection,
        mail_client: Arc<dyn MailClient>,
        token_issuer: Arc<dyn TokenIssuer>,
        ingest_config: IngestConfig,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            mail_client,
            token_issuer,
            ingest_config,
            local_timezone: local_timezone.to_owned(),
        })
    }
}
