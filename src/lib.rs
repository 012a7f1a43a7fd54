//! Mailledger is a web app that turns transaction emails into a personal
//! finance ledger.
//!
//! Emails are pulled from Gmail for each configured source, fields such as the
//! amount and payee are extracted with the source's regular expressions, and
//! the results are stored as ledger entries that can be reviewed and corrected
//! from the dashboard.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod alert;
mod app_state;
mod category;
mod config;
mod database_id;
mod db;
mod endpoints;
mod error_pages;
mod extraction;
mod gmail;
mod html;
mod ingest;
mod ledger;
mod logging;
mod navigation;
mod routing;
mod source;
mod team;
mod timezone;
mod token;
mod user;

pub use app_state::AppState;
pub use config::IngestConfig;
pub use db::initialize as initialize_db;
pub use gmail::{
    GmailClient, MailClient, MailError, Message, MessageBody, MessageHeader, MessagePart,
    MessageRef,
};
pub use logging::logging_middleware;
pub use routing::build_router;
pub use token::{HttpTokenIssuer, TokenError, TokenIssuer};

use crate::{
    alert::Alert,
    category::CategoryId,
    error_pages::{InternalServerError, get_404_not_found_response},
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to name a source.
    #[error("Source name cannot be empty")]
    EmptySourceName,

    /// An empty string was used to name a category.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used to name a team.
    #[error("Team name cannot be empty")]
    EmptyTeamName,

    /// A regular expression on a source did not compile.
    ///
    /// The first field is the name of the form field, the second is the
    /// compiler's error message.
    #[error("the regular expression in {0} is invalid: {1}")]
    InvalidRegex(String, String),

    /// The string given as an email address is not a plausible email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// A user with the same email address already exists.
    #[error("a user with this email address already exists")]
    DuplicateEmail,

    /// The team already has a category with the same name.
    #[error("a category with this name already exists")]
    DuplicateCategoryName,

    /// The category ID used to edit a ledger entry did not match a valid category.
    #[error("the category ID does not refer to a valid category")]
    InvalidCategory(Option<CategoryId>),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a ledger entry that does not exist.
    #[error("tried to update a ledger entry that is not in the database")]
    UpdateMissingLedgerEntry,

    /// The mail API returned an error that the ingestion job does not handle.
    #[error("mail API error: {0}")]
    Mail(MailError),

    /// A new access token could not be obtained.
    #[error("could not refresh the access token: {0}")]
    TokenRefresh(TokenError),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("category.name") =>
            {
                Error::DuplicateCategoryName
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<MailError> for Error {
    fn from(value: MailError) -> Self {
        Error::Mail(value)
    }
}

impl From<TokenError> for Error {
    fn from(value: TokenError) -> Self {
        Error::TokenRefresh(value)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// The status code a JSON API client should receive for this error.
    fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptySourceName
            | Error::EmptyCategoryName
            | Error::EmptyTeamName
            | Error::InvalidRegex(_, _)
            | Error::InvalidEmail(_)
            | Error::InvalidCategory(_)
            | Error::DuplicateCategoryName => StatusCode::BAD_REQUEST,
            Error::NotFound | Error::UpdateMissingLedgerEntry => StatusCode::NOT_FOUND,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::Mail(_) | Error::TokenRefresh(_) => StatusCode::BAD_GATEWAY,
            Error::SqlError(_) | Error::DatabaseLockError | Error::InvalidTimezoneError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render the error as a JSON object `{"error": "..."}` for the JSON API routes.
    ///
    /// Server-side errors are logged and replaced with a generic message.
    fn into_json_response(self) -> Response {
        let status_code = self.status_code();

        let message = if status_code.is_server_error() && status_code != StatusCode::BAD_GATEWAY {
            tracing::error!("An unexpected error occurred: {self}");
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }

    fn into_alert_response(self) -> Response {
        let status_code = self.status_code();

        let alert = match self {
            Error::InvalidTimezoneError(timezone) => Alert::Error {
                message: "Invalid Timezone Settings".to_owned(),
                details: format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            },
            Error::InvalidCategory(category_id) => Alert::Error {
                message: "Invalid category ID".to_owned(),
                details: format!("Could not find a category with the ID {category_id:?}"),
            },
            Error::UpdateMissingLedgerEntry => Alert::Error {
                message: "Could not update ledger entry".to_owned(),
                details: "The ledger entry could not be found.".to_owned(),
            },
            Error::EmptyCategoryName => Alert::Error {
                message: "Invalid category name".to_owned(),
                details: "Category name cannot be empty.".to_owned(),
            },
            Error::DuplicateCategoryName => Alert::Error {
                message: "Duplicate Category Name".to_owned(),
                details: "This team already has a category with that name. \
                    Choose a different name."
                    .to_owned(),
            },
            error @ (Error::EmptySourceName | Error::InvalidRegex(_, _)) => Alert::Error {
                message: "Invalid source".to_owned(),
                details: error.to_string(),
            },
            error => {
                tracing::error!("An unexpected error occurred: {error}");
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details: "An unexpected error occurred, check the server logs for more details."
                        .to_owned(),
                }
            }
        };

        (status_code, alert.into_html()).into_response()
    }
}
