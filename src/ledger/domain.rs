use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    category::CategoryId,
    database_id::DatabaseId,
    source::{CategoryPreset, SourceId, TransactionType, UnknownVariant, text_column},
    user::UserId,
};

/// Database identifier for a ledger entry.
pub type LedgerId = DatabaseId;

/// Whether a ledger entry still holds the values extracted from its email or
/// has been corrected by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Automatic,
    Manual,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Automatic => "AUTOMATIC",
            LedgerStatus::Manual => "MANUAL",
        }
    }
}

impl FromStr for LedgerStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTOMATIC" => Ok(LedgerStatus::Automatic),
            "MANUAL" => Ok(LedgerStatus::Manual),
            other => Err(UnknownVariant::new("ledger status", other)),
        }
    }
}

text_column!(LedgerStatus);

/// A ledger entry as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: LedgerId,
    pub date: OffsetDateTime,
    /// The Gmail message ID, `None` for entries that did not come from an email.
    pub email_id: Option<String>,
    pub email_subject: String,
    pub body: String,
    pub amount_extract: Option<f64>,
    pub payee_extract: Option<String>,
    pub category_extract: CategoryPreset,
    pub transaction_type_extract: TransactionType,
    pub category_id: Option<CategoryId>,
    pub status: LedgerStatus,
    pub source_id: SourceId,
    pub user_id: UserId,
}

/// The values extracted from an email, written with [super::upsert_ledger_entry].
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub date: OffsetDateTime,
    pub email_id: String,
    pub email_subject: String,
    pub body: String,
    pub amount_extract: Option<f64>,
    pub payee_extract: Option<String>,
    pub category_extract: CategoryPreset,
    pub transaction_type_extract: TransactionType,
    pub source_id: SourceId,
    pub user_id: UserId,
}

/// A user's correction of a ledger entry.
///
/// Submitted from the ledger page, the values are stored as is. A cleared
/// payee is stored as an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEdit {
    pub transaction_type: TransactionType,
    pub category_id: Option<CategoryId>,
    pub amount: Option<f64>,
    #[serde(default)]
    pub payee: String,
}

/// A ledger entry with the names needed to display it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub entry: LedgerEntry,
    pub source_name: String,
    pub user_email: String,
}
