//! Settings for the email ingestion job.

use crate::gmail::DEFAULT_GMAIL_BASE_URL;

/// The default number of days to look back when searching for emails.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 2;

/// Controls which emails the ingestion job looks at and which services it talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Only emails received in the last `lookback_days` days are fetched.
    pub lookback_days: u32,

    /// The base URL of the Gmail API, e.g. "https://gmail.googleapis.com".
    pub gmail_base_url: String,

    /// The base URL of the service that issues access tokens.
    pub token_base_url: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            gmail_base_url: DEFAULT_GMAIL_BASE_URL.to_owned(),
            token_base_url: "http://localhost:3000".to_owned(),
        }
    }
}
