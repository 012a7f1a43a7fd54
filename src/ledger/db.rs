//! Database operations for the ledger.

use std::collections::HashSet;

use rusqlite::{Connection, Row, params_from_iter};
use time::UtcOffset;

use crate::{
    Error,
    ledger::{LedgerEdit, LedgerEntry, LedgerId, LedgerRow, LedgerStatus, NewLedgerEntry},
    team::TeamId,
};

const LEDGER_COLUMNS: &str = "ledger.id, ledger.date, ledger.email_id, ledger.email_subject,
    ledger.body, ledger.amount_extract, ledger.payee_extract, ledger.category_extract,
    ledger.transaction_type_extract, ledger.category_id, ledger.status, ledger.source_id,
    ledger.user_id";

/// Create the ledger table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_ledger_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS ledger (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL,
            email_id TEXT UNIQUE,
            email_subject TEXT NOT NULL,
            body TEXT NOT NULL,
            amount_extract REAL,
            payee_extract TEXT,
            category_extract TEXT NOT NULL,
            transaction_type_extract TEXT NOT NULL,
            category_id INTEGER,
            status TEXT NOT NULL,
            source_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(source_id) REFERENCES source(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_ledger_user_date ON ledger(user_id, date);",
    )?;

    Ok(())
}

/// Insert the ledger entry for an email, or refresh the extracted values if
/// the email has already been recorded.
///
/// Entries that a user has edited keep their manual values. Dates are stored
/// in UTC so that they sort correctly.
///
/// Returns the ID of the entry for the email.
pub fn upsert_ledger_entry(
    entry: &NewLedgerEntry,
    connection: &Connection,
) -> Result<LedgerId, Error> {
    connection.execute(
        "INSERT INTO ledger (date, email_id, email_subject, body, amount_extract,
            payee_extract, category_extract, transaction_type_extract, status, source_id,
            user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(email_id) DO UPDATE SET
            date = excluded.date,
            email_subject = excluded.email_subject,
            body = excluded.body,
            amount_extract = excluded.amount_extract,
            payee_extract = excluded.payee_extract,
            category_extract = excluded.category_extract,
            transaction_type_extract = excluded.transaction_type_extract,
            source_id = excluded.source_id,
            user_id = excluded.user_id
         WHERE ledger.status = ?9",
        rusqlite::params![
            entry.date.to_offset(UtcOffset::UTC),
            entry.email_id,
            entry.email_subject,
            entry.body,
            entry.amount_extract,
            entry.payee_extract,
            entry.category_extract,
            entry.transaction_type_extract,
            LedgerStatus::Automatic,
            entry.source_id,
            entry.user_id,
        ],
    )?;

    connection
        .query_row(
            "SELECT id FROM ledger WHERE email_id = ?1",
            [&entry.email_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Return the subset of `email_ids` that already have a ledger entry.
pub fn get_existing_email_ids(
    email_ids: &[String],
    connection: &Connection,
) -> Result<HashSet<String>, Error> {
    if email_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders = vec!["?"; email_ids.len()].join(", ");

    connection
        .prepare(&format!(
            "SELECT email_id FROM ledger WHERE email_id IN ({placeholders})"
        ))?
        .query_map(params_from_iter(email_ids), |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(Error::from))
        .collect()
}

/// Retrieve a ledger entry by its ID.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `id` does not refer to a ledger entry.
pub fn get_ledger_entry(id: LedgerId, connection: &Connection) -> Result<LedgerEntry, Error> {
    connection
        .prepare(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger WHERE ledger.id = :id"
        ))?
        .query_row(&[(":id", &id)], map_ledger_row)
        .map_err(Error::from)
}

/// Retrieve the ledger entries of every user in a team, newest first.
pub fn get_team_ledger(team_id: TeamId, connection: &Connection) -> Result<Vec<LedgerRow>, Error> {
    connection
        .prepare(&format!(
            "SELECT {LEDGER_COLUMNS}, source.name, user.email FROM ledger
             INNER JOIN user ON user.id = ledger.user_id
             INNER JOIN source ON source.id = ledger.source_id
             WHERE user.team_id = :team_id
             ORDER BY ledger.date DESC, ledger.id DESC"
        ))?
        .query_map(&[(":team_id", &team_id)], |row| {
            Ok(LedgerRow {
                entry: map_ledger_row(row)?,
                source_name: row.get(13)?,
                user_email: row.get(14)?,
            })
        })?
        .map(|maybe_row| maybe_row.map_err(Error::from))
        .collect()
}

/// Overwrite a ledger entry's values with a user's edit and mark it as manual.
///
/// # Errors
///
/// This function will return a:
/// - [Error::UpdateMissingLedgerEntry] if `id` does not refer to a ledger entry,
/// - [Error::InvalidCategory] if the edit's category does not exist,
/// - [Error::SqlError] if there is some other SQL error.
pub fn update_ledger_entry_manually(
    id: LedgerId,
    edit: &LedgerEdit,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    let rows_affected = connection
        .execute(
            "UPDATE ledger SET
                transaction_type_extract = ?1,
                category_id = ?2,
                amount_extract = ?3,
                payee_extract = ?4,
                status = ?5
             WHERE id = ?6",
            rusqlite::params![
                edit.transaction_type,
                edit.category_id,
                edit.amount,
                edit.payee,
                LedgerStatus::Manual,
                id,
            ],
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(edit.category_id),
            error => error.into(),
        })?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingLedgerEntry);
    }

    get_ledger_entry(id, connection)
}

fn map_ledger_row(row: &Row) -> Result<LedgerEntry, rusqlite::Error> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        date: row.get(1)?,
        email_id: row.get(2)?,
        email_subject: row.get(3)?,
        body: row.get(4)?,
        amount_extract: row.get(5)?,
        payee_extract: row.get(6)?,
        category_extract: row.get(7)?,
        transaction_type_extract: row.get(8)?,
        category_id: row.get(9)?,
        status: row.get(10)?,
        source_id: row.get(11)?,
        user_id: row.get(12)?,
    })
}
