//! Pulls the amount and payee out of an email body with a source's regular
//! expressions.

use std::sync::OnceLock;

use regex::Regex;

use crate::source::Source;

/// The fields extracted from an email body. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub amount: Option<f64>,
    pub payee: Option<String>,
}

/// Apply the source's amount and payee rules to `body`.
///
/// Each field tries the primary regex first and then the backup.
pub fn extract_fields(source: &Source, body: &str) -> Extracted {
    let amount = [&source.amount_regex, &source.amount_regex_backup]
        .into_iter()
        .flatten()
        .find_map(|pattern| {
            capture(pattern, "amount", body).and_then(|captured| parse_amount(&captured))
        });

    let payee = [&source.payee_regex, &source.payee_regex_backup]
        .into_iter()
        .flatten()
        .find_map(|pattern| {
            capture(pattern, "payee", body)
                .map(|captured| captured.trim().to_owned())
                .filter(|payee| !payee.is_empty())
        });

    Extracted { amount, payee }
}

/// The text captured by `pattern` in `haystack`.
///
/// Prefers the named group `group_name`, then the first capture group, then
/// the whole match.
fn capture(pattern: &str, group_name: &str, haystack: &str) -> Option<String> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => {
            tracing::error!("Skipping invalid regex {pattern:?}: {error}");
            return None;
        }
    };

    let captures = regex.captures(haystack)?;

    captures
        .name(group_name)
        .or_else(|| captures.get(1))
        .or_else(|| captures.get(0))
        .map(|matched| matched.as_str().to_owned())
}

/// Parse a captured amount such as "Rs. 1,234.50", "$ 12" or "INR 500/-" as a number.
///
/// The first number in `text` is used, thousands separators are ignored.
fn parse_amount(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();

    let number = NUMBER
        .get_or_init(|| Regex::new(r"-?[0-9][0-9,]*(?:\.[0-9]+)?").ok())
        .as_ref()?;
    let cleaned = number.find(text)?.as_str().replace(',', "");

    cleaned.parse::<f64>().ok().filter(|amount| amount.is_finite())
}
