//! Code for creating the user table, fetching users from the database and the
//! endpoint for creating users.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    team::{TeamId, create_team},
};

/// Database identifier for a user.
pub type UserId = DatabaseId;

/// A user of the application.
///
/// The access token is the OAuth token used to read the user's mailbox. It is
/// never serialized so that it does not leak through the JSON API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub team_id: TeamId,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            access_token TEXT,
            team_id INTEGER NOT NULL,
            FOREIGN KEY(team_id) REFERENCES team(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_user_team_id ON user(team_id);",
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidEmail] if `email` is not a valid email address,
/// - [Error::DuplicateEmail] if a user with `email` already exists,
/// - [Error::NotFound] if `team_id` does not refer to a team,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_user(
    email: &str,
    access_token: Option<&str>,
    team_id: TeamId,
    connection: &Connection,
) -> Result<User, Error> {
    let email = email.trim();

    if !EmailAddress::is_valid(email) {
        return Err(Error::InvalidEmail(email.to_owned()));
    }

    connection
        .execute(
            "INSERT INTO user (email, access_token, team_id) VALUES (?1, ?2, ?3)",
            (email, access_token, team_id),
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

    Ok(User {
        id: connection.last_insert_rowid(),
        email: email.to_owned(),
        access_token: access_token.map(ToOwned::to_owned),
        team_id,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, access_token, team_id FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the users in a team, ordered by email address.
pub fn get_team_users(team_id: TeamId, connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, email, access_token, team_id FROM user
             WHERE team_id = :team_id ORDER BY email ASC",
        )?
        .query_map(&[(":team_id", &team_id)], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Replace the stored access token for a user.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `user_id` does not belong
/// to a registered user.
pub fn update_access_token(
    user_id: UserId,
    access_token: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET access_token = ?1 WHERE id = ?2",
        (access_token, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

pub(crate) fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        access_token: row.get(2)?,
        team_id: row.get(3)?,
    })
}

/// The state needed for creating users.
#[derive(Debug, Clone)]
pub struct CreateUserState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body for creating a user.
///
/// Either `team_id` refers to an existing team, or `team_name` names a new
/// team that is created along with the user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub team_id: Option<TeamId>,
    pub team_name: Option<String>,
    pub access_token: Option<String>,
}

/// A route handler for creating a new user, responds with the user as JSON.
pub async fn create_user_endpoint(
    State(state): State<CreateUserState>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    let mut connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_json_response();
        }
    };

    match create_user_with_team(&request, &mut connection) {
        Ok(user) => {
            tracing::info!("Created user #{} in team #{}", user.id, user.team_id);
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(error) => error.into_json_response(),
    }
}

/// Create the user in `request`, creating its team first when only a team name is given.
///
/// The team and the user are written in one transaction, so a rejected user
/// does not leave a new team behind.
fn create_user_with_team(
    request: &CreateUserRequest,
    connection: &mut Connection,
) -> Result<User, Error> {
    let email = request.email.trim();

    if !EmailAddress::is_valid(email) {
        return Err(Error::InvalidEmail(email.to_owned()));
    }

    let transaction = connection.transaction()?;

    let team_id = match (request.team_id, request.team_name.as_deref()) {
        (Some(team_id), _) => team_id,
        (None, Some(team_name)) => create_team(team_name, &transaction)?.id,
        (None, None) => return Err(Error::EmptyTeamName),
    };

    let user = create_user(
        email,
        request.access_token.as_deref(),
        team_id,
        &transaction,
    )?;

    transaction.commit()?;

    Ok(user)
}

#[cfg(test)]
mod user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{Error, endpoints, initialize_db, team::create_team};

    use super::{
        CreateUserRequest, CreateUserState, create_user, create_user_endpoint, get_team_users,
        get_user_by_id, update_access_token,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize_db(&conn).expect("Could not initialize database");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let conn = get_db_connection();
        let team = create_team("Household", &conn).unwrap();

        let user = create_user("foo@bar.baz", Some("token"), team.id, &conn).unwrap();

        assert!(user.id > 0);
        assert_eq!(user.email, "foo@bar.baz");
        assert_eq!(user.access_token.as_deref(), Some("token"));
        assert_eq!(get_user_by_id(user.id, &conn), Ok(user));
    }

    #[test]
    fn insert_user_fails_on_invalid_email() {
        let conn = get_db_connection();
        let team = create_team("Household", &conn).unwrap();

        let result = create_user("not an email", None, team.id, &conn);

        assert_eq!(result, Err(Error::InvalidEmail("not an email".to_owned())));
    }

    #[test]
    fn insert_user_fails_on_duplicate_email() {
        let conn = get_db_connection();
        let team = create_team("Household", &conn).unwrap();
        create_user("foo@bar.baz", None, team.id, &conn).unwrap();

        let result = create_user("foo@bar.baz", None, team.id, &conn);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn insert_user_fails_on_missing_team() {
        let conn = get_db_connection();

        let result = create_user("foo@bar.baz", None, 99, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_team_users_excludes_other_teams() {
        let conn = get_db_connection();
        let team = create_team("Household", &conn).unwrap();
        let other_team = create_team("Other", &conn).unwrap();
        let bob = create_user("bob@bar.baz", None, team.id, &conn).unwrap();
        let alice = create_user("alice@bar.baz", None, team.id, &conn).unwrap();
        create_user("eve@bar.baz", None, other_team.id, &conn).unwrap();

        assert_eq!(get_team_users(team.id, &conn), Ok(vec![alice, bob]));
    }

    #[test]
    fn update_access_token_replaces_token() {
        let conn = get_db_connection();
        let team = create_team("Household", &conn).unwrap();
        let user = create_user("foo@bar.baz", Some("old"), team.id, &conn).unwrap();

        update_access_token(user.id, "new", &conn).unwrap();

        let got = get_user_by_id(user.id, &conn).unwrap();
        assert_eq!(got.access_token.as_deref(), Some("new"));
    }

    #[test]
    fn update_access_token_fails_on_missing_user() {
        let conn = get_db_connection();

        assert_eq!(update_access_token(1, "new", &conn), Err(Error::NotFound));
    }

    fn get_test_server() -> TestServer {
        let state = CreateUserState {
            db_connection: Arc::new(Mutex::new(get_db_connection())),
        };
        let app = Router::new()
            .route(endpoints::CREATE_USER, post(create_user_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn create_user_with_new_team_succeeds() {
        let server = get_test_server();

        let response = server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "foo@bar.baz".to_owned(),
                team_id: None,
                team_name: Some("Household".to_owned()),
                access_token: Some("secret-token".to_owned()),
            })
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["email"], "foo@bar.baz");
        assert_eq!(body["teamId"], 1);
        assert!(
            body.get("accessToken").is_none(),
            "the access token should not be serialized"
        );
    }

    #[tokio::test]
    async fn create_user_without_team_is_bad_request() {
        let server = get_test_server();

        server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "foo@bar.baz".to_owned(),
                team_id: None,
                team_name: None,
                access_token: None,
            })
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_user_with_missing_team_is_not_found() {
        let server = get_test_server();

        server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "foo@bar.baz".to_owned(),
                team_id: Some(42),
                team_name: None,
                access_token: None,
            })
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    fn team_count(state: &CreateUserState) -> i64 {
        state
            .db_connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM team", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn rejected_user_does_not_create_team() {
        let state = CreateUserState {
            db_connection: Arc::new(Mutex::new(get_db_connection())),
        };
        let app = Router::new()
            .route(endpoints::CREATE_USER, post(create_user_endpoint))
            .with_state(state.clone());
        let server = TestServer::try_new(app).expect("Could not create test server.");

        server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "not-an-email".to_owned(),
                team_id: None,
                team_name: Some("Ghost".to_owned()),
                access_token: None,
            })
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(team_count(&state), 0);

        server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "foo@bar.baz".to_owned(),
                team_id: None,
                team_name: Some("Household".to_owned()),
                access_token: None,
            })
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post(endpoints::CREATE_USER)
            .json(&CreateUserRequest {
                email: "foo@bar.baz".to_owned(),
                team_id: None,
                team_name: Some("Ghost".to_owned()),
                access_token: None,
            })
            .await
            .assert_status(StatusCode::CONFLICT);
        assert_eq!(team_count(&state), 1);
    }
}
