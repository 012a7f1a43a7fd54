//! Database operations for sources.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    source::{NewSource, Source, SourceId},
    team::TeamId,
};

const SOURCE_COLUMNS: &str = "source.id, source.name, source.source_type, source.default_type,
    source.default_category, source.query, source.subject, source.label, source.from_email,
    source.amount_regex, source.amount_regex_backup, source.payee_regex,
    source.payee_regex_backup, source.user_id";

/// Create the source table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_source_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS source (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            default_type TEXT NOT NULL,
            default_category TEXT NOT NULL,
            query TEXT,
            subject TEXT,
            label TEXT,
            from_email TEXT,
            amount_regex TEXT,
            amount_regex_backup TEXT,
            payee_regex TEXT,
            payee_regex_backup TEXT,
            user_id INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_source_user_id ON source(user_id);",
    )?;

    Ok(())
}

/// Insert a validated source and return it with its generated ID.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if the source's user does not exist,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_source(source: NewSource, connection: &Connection) -> Result<Source, Error> {
    connection
        .execute(
            "INSERT INTO source (name, source_type, default_type, default_category, query,
                subject, label, from_email, amount_regex, amount_regex_backup, payee_regex,
                payee_regex_backup, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                source.name,
                source.source_type,
                source.default_type,
                source.default_category,
                source.query,
                source.subject,
                source.label,
                source.from_email,
                source.amount_regex,
                source.amount_regex_backup,
                source.payee_regex,
                source.payee_regex_backup,
                source.user_id,
            ],
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

    Ok(Source {
        id: connection.last_insert_rowid(),
        name: source.name,
        source_type: source.source_type,
        default_type: source.default_type,
        default_category: source.default_category,
        query: source.query,
        subject: source.subject,
        label: source.label,
        from_email: source.from_email,
        amount_regex: source.amount_regex,
        amount_regex_backup: source.amount_regex_backup,
        payee_regex: source.payee_regex,
        payee_regex_backup: source.payee_regex_backup,
        user_id: source.user_id,
    })
}

/// Retrieve a source by its ID.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `source_id` does not refer to a source.
pub fn get_source(source_id: SourceId, connection: &Connection) -> Result<Source, Error> {
    connection
        .prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM source WHERE source.id = :id"
        ))?
        .query_row(&[(":id", &source_id)], map_source_row)
        .map_err(|error| error.into())
}

/// Retrieve the sources of every user in a team along with the owner's email
/// address, ordered by owner and then by name.
pub fn get_sources_for_team(
    team_id: TeamId,
    connection: &Connection,
) -> Result<Vec<(Source, String)>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SOURCE_COLUMNS}, user.email FROM source
             INNER JOIN user ON user.id = source.user_id
             WHERE user.team_id = :team_id
             ORDER BY user.email ASC, source.name ASC"
        ))?
        .query_map(&[(":team_id", &team_id)], |row| {
            let source = map_source_row(row)?;
            let email = row.get(14)?;

            Ok((source, email))
        })?
        .map(|maybe_source| maybe_source.map_err(Error::from))
        .collect()
}

fn map_source_row(row: &Row) -> Result<Source, rusqlite::Error> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: row.get(2)?,
        default_type: row.get(3)?,
        default_category: row.get(4)?,
        query: row.get(5)?,
        subject: row.get(6)?,
        label: row.get(7)?,
        from_email: row.get(8)?,
        amount_regex: row.get(9)?,
        amount_regex_backup: row.get(10)?,
        payee_regex: row.get(11)?,
        payee_regex_backup: row.get(12)?,
        user_id: row.get(13)?,
    })
}

#[cfg(test)]
mod source_db_tests {
    use rusqlite::Connection;

    use crate::{
        Error, initialize_db,
        source::{CategoryPreset, SourceFields, SourceType, TransactionType},
        team::create_team,
        user::create_user,
    };

    use super::{create_source, get_source, get_sources_for_team};

    fn get_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).expect("Could not initialize database");
        connection
    }

    fn fields(name: &str, user_id: i64) -> SourceFields {
        SourceFields {
            name: name.to_owned(),
            source_type: SourceType::Mail,
            default_type: TransactionType::Income,
            default_category: CategoryPreset::Salary,
            from_email: Some("payroll@work.com".to_owned()),
            amount_regex: Some(r"credited with \$([0-9,.]+)".to_owned()),
            user_id,
            ..Default::default()
        }
    }

    #[test]
    fn create_and_get_source() {
        let connection = get_db_connection();
        let team = create_team("Household", &connection).unwrap();
        let user = create_user("a@example.com", None, team.id, &connection).unwrap();

        let source =
            create_source(fields("Payroll", user.id).validate().unwrap(), &connection).unwrap();

        assert!(source.id > 0);
        assert_eq!(get_source(source.id, &connection), Ok(source));
    }

    #[test]
    fn create_source_for_missing_user_fails() {
        let connection = get_db_connection();

        let result = create_source(fields("Payroll", 9).validate().unwrap(), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_missing_source_fails() {
        let connection = get_db_connection();

        assert_eq!(get_source(1, &connection), Err(Error::NotFound));
    }

    #[test]
    fn lists_sources_of_team_members_only() {
        let connection = get_db_connection();
        let team = create_team("Household", &connection).unwrap();
        let other_team = create_team("Other", &connection).unwrap();
        let alice = create_user("alice@example.com", None, team.id, &connection).unwrap();
        let bob = create_user("bob@example.com", None, team.id, &connection).unwrap();
        let eve = create_user("eve@example.com", None, other_team.id, &connection).unwrap();
        let bob_source =
            create_source(fields("Card", bob.id).validate().unwrap(), &connection).unwrap();
        let alice_source =
            create_source(fields("Bank", alice.id).validate().unwrap(), &connection).unwrap();
        create_source(fields("Wallet", eve.id).validate().unwrap(), &connection).unwrap();

        let got = get_sources_for_team(team.id, &connection).unwrap();

        assert_eq!(
            got,
            vec![
                (alice_source, "alice@example.com".to_owned()),
                (bob_source, "bob@example.com".to_owned()),
            ]
        );
    }
}
