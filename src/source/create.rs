//! Endpoints for creating sources, as JSON for API clients and as a form
//! submission from the sources page.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    source::{Source, SourceFields, create_source},
    user::get_user_by_id,
};

/// The state needed for creating a source.
#[derive(Debug, Clone)]
pub struct CreateSourceState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateSourceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a source from a JSON body, responds with the
/// new source as JSON.
pub async fn create_source_endpoint(
    State(state): State<CreateSourceState>,
    Json(fields): Json<SourceFields>,
) -> Response {
    match validate_and_create(fields, &state.db_connection) {
        Ok(source) => (StatusCode::CREATED, Json(source)).into_response(),
        Err(error) => error.into_json_response(),
    }
}

/// A route handler for the create form on the sources page.
///
/// Redirects to the sources page of the owner's team on success.
pub async fn create_source_form_endpoint(
    State(state): State<CreateSourceState>,
    Form(fields): Form<SourceFields>,
) -> Response {
    let source = match validate_and_create(fields, &state.db_connection) {
        Ok(source) => source,
        Err(error) => return error.into_alert_response(),
    };

    let team_id = match state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)
        .and_then(|connection| get_user_by_id(source.user_id, &connection))
    {
        Ok(user) => user.team_id,
        Err(error) => return error.into_alert_response(),
    };

    (
        HxRedirect(endpoints::format_endpoint(endpoints::SOURCES_VIEW, team_id)),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

fn validate_and_create(
    fields: SourceFields,
    db_connection: &Mutex<Connection>,
) -> Result<Source, Error> {
    let new_source = fields.validate()?;

    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let source = create_source(new_source, &connection)?;
    tracing::info!(
        "Created source #{} \"{}\" for user #{}",
        source.id,
        source.name,
        source.user_id
    );

    Ok(source)
}

#[cfg(test)]
mod create_source_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        endpoints, initialize_db,
        source::{get_source, get_sources_for_team},
        team::create_team,
        user::create_user,
    };

    use super::{CreateSourceState, create_source_endpoint, create_source_form_endpoint};

    fn get_state() -> CreateSourceState {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let team = create_team("Household", &connection).unwrap();
        create_user("a@example.com", None, team.id, &connection).unwrap();

        CreateSourceState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    fn get_test_server(state: CreateSourceState) -> TestServer {
        let app = Router::new()
            .route(endpoints::CREATE_SOURCE, post(create_source_endpoint))
            .route(endpoints::POST_SOURCE, post(create_source_form_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn create_source_succeeds() {
        let state = get_state();
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::CREATE_SOURCE)
            .json(&json!({
                "name": "Card alerts",
                "defaultType": "EXPENSE",
                "defaultCategory": "SHOPPING",
                "fromEmail": "alerts@bank.com",
                "amountRegex": r"INR ([0-9,.]+)",
                "payeeRegex": r"at (?P<payee>[A-Za-z ]+) on",
                "userId": 1
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "Card alerts");
        assert_eq!(body["defaultCategory"], "SHOPPING");
        assert_eq!(body["sourceType"], "MAIL");

        let id = body["id"].as_i64().unwrap();
        let stored = get_source(id, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(stored.from_email.as_deref(), Some("alerts@bank.com"));
    }

    #[tokio::test]
    async fn invalid_regex_is_bad_request() {
        let state = get_state();
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::CREATE_SOURCE)
            .json(&json!({
                "name": "Card alerts",
                "amountRegex": "([0-9",
                "userId": 1
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<serde_json::Value>();
        assert!(
            body["error"].as_str().unwrap().contains("amountRegex"),
            "error should name the invalid field, got {body}"
        );
        let sources = get_sources_for_team(1, &state.db_connection.lock().unwrap()).unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let server = get_test_server(get_state());

        server
            .post(endpoints::CREATE_SOURCE)
            .json(&json!({ "name": "Card alerts", "userId": 42 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn form_submission_redirects_to_sources_page() {
        let state = get_state();
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::POST_SOURCE)
            .form(&[
                ("name", "Card alerts"),
                ("sourceType", "MAIL"),
                ("defaultType", "EXPENSE"),
                ("defaultCategory", "FUEL"),
                ("subject", "Transaction alert"),
                ("label", ""),
                ("userId", "1"),
            ])
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("hx-redirect"), "/1/sources");
        let sources = get_sources_for_team(1, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].0.label, None);
    }
}
