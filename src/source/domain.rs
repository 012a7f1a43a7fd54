//! Source types, the preset enums stored alongside them, and validation of
//! user-submitted source fields.

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, user::UserId};

/// Database identifier for a source.
pub type SourceId = DatabaseId;

/// A string stored in the database did not match any variant of an enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} \"{value}\"")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Implements `Display`, `ToSql` and `FromSql` for an enum with `as_str` and
/// a `FromStr` impl, so the enum is stored as its text representation.
macro_rules! text_column {
    ($name:ty) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|error| rusqlite::types::FromSqlError::Other(Box::new(error)))
            }
        }
    };
}

pub(crate) use text_column;

/// Where a source's transactions come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[default]
    Mail,
    Api,
}

impl SourceType {
    pub const ALL: [SourceType; 2] = [SourceType::Mail, SourceType::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Mail => "MAIL",
            SourceType::Api => "API",
        }
    }
}

impl FromStr for SourceType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MAIL" => Ok(SourceType::Mail),
            "API" => Ok(SourceType::Api),
            other => Err(UnknownVariant::new("source type", other)),
        }
    }
}

text_column!(SourceType);

/// Whether money is leaving or entering the user's account.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[default]
    Expense,
    Income,
}

impl TransactionType {
    pub const ALL: [TransactionType; 2] = [TransactionType::Expense, TransactionType::Income];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "EXPENSE",
            TransactionType::Income => "INCOME",
        }
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPENSE" => Ok(TransactionType::Expense),
            "INCOME" => Ok(TransactionType::Income),
            other => Err(UnknownVariant::new("transaction type", other)),
        }
    }
}

text_column!(TransactionType);

/// The fixed set of categories a source can assign to its ledger entries
/// before a user picks one of the team's own categories.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryPreset {
    FoodAndDrinks,
    Shopping,
    Grooming,
    Health,
    Investment,
    Travel,
    Entertainment,
    #[default]
    Others,
    Groceries,
    Fuel,
    Bills,
    Learning,
    LendSplitwise,
    Refund,
    Salary,
    Redeem,
    SelfTransfer,
    SideIncome,
    CreditCardBill,
    Junk,
}

impl CategoryPreset {
    pub const ALL: [CategoryPreset; 20] = [
        CategoryPreset::FoodAndDrinks,
        CategoryPreset::Shopping,
        CategoryPreset::Grooming,
        CategoryPreset::Health,
        CategoryPreset::Investment,
        CategoryPreset::Travel,
        CategoryPreset::Entertainment,
        CategoryPreset::Others,
        CategoryPreset::Groceries,
        CategoryPreset::Fuel,
        CategoryPreset::Bills,
        CategoryPreset::Learning,
        CategoryPreset::LendSplitwise,
        CategoryPreset::Refund,
        CategoryPreset::Salary,
        CategoryPreset::Redeem,
        CategoryPreset::SelfTransfer,
        CategoryPreset::SideIncome,
        CategoryPreset::CreditCardBill,
        CategoryPreset::Junk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryPreset::FoodAndDrinks => "FOOD_AND_DRINKS",
            CategoryPreset::Shopping => "SHOPPING",
            CategoryPreset::Grooming => "GROOMING",
            CategoryPreset::Health => "HEALTH",
            CategoryPreset::Investment => "INVESTMENT",
            CategoryPreset::Travel => "TRAVEL",
            CategoryPreset::Entertainment => "ENTERTAINMENT",
            CategoryPreset::Others => "OTHERS",
            CategoryPreset::Groceries => "GROCERIES",
            CategoryPreset::Fuel => "FUEL",
            CategoryPreset::Bills => "BILLS",
            CategoryPreset::Learning => "LEARNING",
            CategoryPreset::LendSplitwise => "LEND_SPLITWISE",
            CategoryPreset::Refund => "REFUND",
            CategoryPreset::Salary => "SALARY",
            CategoryPreset::Redeem => "REDEEM",
            CategoryPreset::SelfTransfer => "SELF_TRANSFER",
            CategoryPreset::SideIncome => "SIDE_INCOME",
            CategoryPreset::CreditCardBill => "CREDIT_CARD_BILL",
            CategoryPreset::Junk => "JUNK",
        }
    }
}

impl FromStr for CategoryPreset {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("category preset", s))
    }
}

text_column!(CategoryPreset);

/// A user's rule set for turning matching emails into ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub source_type: SourceType,
    pub default_type: TransactionType,
    pub default_category: CategoryPreset,
    pub query: Option<String>,
    pub subject: Option<String>,
    pub label: Option<String>,
    pub from_email: Option<String>,
    pub amount_regex: Option<String>,
    pub amount_regex_backup: Option<String>,
    pub payee_regex: Option<String>,
    pub payee_regex_backup: Option<String>,
    pub user_id: UserId,
}

impl Source {
    /// The mailbox search filter for this source.
    ///
    /// A non-empty raw `query` is used as is. Otherwise the filter is built
    /// from the sender, subject and label, skipping any that are blank.
    pub fn search_filter(&self) -> String {
        if let Some(query) = non_blank(&self.query) {
            return query.to_owned();
        }

        let from = non_blank(&self.from_email).map(|from| format!("from:{from}"));
        let subject = non_blank(&self.subject).map(|subject| format!("subject:\"{subject}\""));
        let label = non_blank(&self.label).map(|label| format!("label:{label}"));

        [from, subject, label]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The fields submitted to create a source, either as JSON or from the form
/// on the sources page.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFields {
    #[serde(alias = "sourceName")]
    pub name: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub default_type: TransactionType,
    #[serde(default)]
    pub default_category: CategoryPreset,
    pub query: Option<String>,
    pub subject: Option<String>,
    pub label: Option<String>,
    pub from_email: Option<String>,
    pub amount_regex: Option<String>,
    pub amount_regex_backup: Option<String>,
    pub payee_regex: Option<String>,
    pub payee_regex_backup: Option<String>,
    pub user_id: UserId,
}

/// Source fields that have passed validation and are ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub name: String,
    pub source_type: SourceType,
    pub default_type: TransactionType,
    pub default_category: CategoryPreset,
    pub query: Option<String>,
    pub subject: Option<String>,
    pub label: Option<String>,
    pub from_email: Option<String>,
    pub amount_regex: Option<String>,
    pub amount_regex_backup: Option<String>,
    pub payee_regex: Option<String>,
    pub payee_regex_backup: Option<String>,
    pub user_id: UserId,
}

impl SourceFields {
    /// Check the submitted fields and normalise blank optional fields to `None`.
    ///
    /// # Errors
    ///
    /// This function will return a:
    /// - [Error::EmptySourceName] if the name is blank,
    /// - [Error::InvalidRegex] naming the first regex field that does not compile.
    pub fn validate(self) -> Result<NewSource, Error> {
        let name = self.name.trim();

        if name.is_empty() {
            return Err(Error::EmptySourceName);
        }

        let amount_regex = checked_regex("amountRegex", self.amount_regex)?;
        let amount_regex_backup = checked_regex("amountRegexBackup", self.amount_regex_backup)?;
        let payee_regex = checked_regex("payeeRegex", self.payee_regex)?;
        let payee_regex_backup = checked_regex("payeeRegexBackup", self.payee_regex_backup)?;

        Ok(NewSource {
            name: name.to_owned(),
            source_type: self.source_type,
            default_type: self.default_type,
            default_category: self.default_category,
            query: trimmed(self.query),
            subject: trimmed(self.subject),
            label: trimmed(self.label),
            from_email: trimmed(self.from_email),
            amount_regex,
            amount_regex_backup,
            payee_regex,
            payee_regex_backup,
            user_id: self.user_id,
        })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    non_blank(&value).map(str::to_owned)
}

/// Regexes are not trimmed since leading or trailing spaces may be part of the pattern.
fn checked_regex(field: &str, pattern: Option<String>) -> Result<Option<String>, Error> {
    match pattern.filter(|pattern| !pattern.trim().is_empty()) {
        Some(pattern) => match Regex::new(&pattern) {
            Ok(_) => Ok(Some(pattern)),
            Err(error) => Err(Error::InvalidRegex(field.to_owned(), error.to_string())),
        },
        None => Ok(None),
    }
}
