//! Database operations for categories.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, CategoryName},
    team::TeamId,
};

/// Create a category for a team and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if the team already has a category called `name`,
/// - [Error::NotFound] if `team_id` does not refer to a team,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: CategoryName,
    team_id: TeamId,
    connection: &Connection,
) -> Result<Category, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection
        .execute(
            "INSERT INTO category (name, team_id, created_at) VALUES (?1, ?2, ?3);",
            (name.as_ref(), team_id, created_at),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name,
        team_id,
        created_at,
    })
}

/// Retrieve the categories of a team, oldest first.
pub fn get_categories_for_team(
    team_id: TeamId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, team_id, created_at FROM category
             WHERE team_id = :team_id
             ORDER BY created_at ASC, id ASC;",
        )?
        .query_map(&[(":team_id", &team_id)], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            team_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(team_id) REFERENCES team(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(team_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_category_team_id ON category(team_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        team_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}
