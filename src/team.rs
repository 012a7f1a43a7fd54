//! Teams group users together so they can share a ledger and categories.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId};

/// Database identifier for a team.
pub type TeamId = DatabaseId;

/// A group of users that share categories and see each other's ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// Create the team table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_team_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS team (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create a team and return it with its generated ID.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyTeamName] if `name` is empty or only whitespace,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_team(name: &str, connection: &Connection) -> Result<Team, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyTeamName);
    }

    connection.execute("INSERT INTO team (name) VALUES (?1)", (name,))?;

    Ok(Team {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
    })
}

/// Retrieve a team by its ID.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `team_id` does not refer to a team.
pub fn get_team(team_id: TeamId, connection: &Connection) -> Result<Team, Error> {
    connection
        .prepare("SELECT id, name FROM team WHERE id = :id")?
        .query_row(&[(":id", &team_id)], |row| {
            Ok(Team {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .map_err(|error| error.into())
}
