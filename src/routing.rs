//! Application router configuration.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{get, post},
};

use crate::{
    AppState,
    category::{create_category_endpoint, get_categories_page},
    endpoints,
    error_pages::get_404_not_found,
    ingest::fetch_email_endpoint,
    ledger::{edit_ledger_entry_endpoint, get_ledger_page},
    logging::logging_middleware,
    source::{create_source_endpoint, create_source_form_endpoint, get_sources_page},
    team::TeamId,
    user::create_user_endpoint,
};

/// The team whose ledger is shown at the root path.
const DEFAULT_TEAM_ID: TeamId = 1;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let pages = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::LEDGER_VIEW, get(get_ledger_page))
        .route(endpoints::SOURCES_VIEW, get(get_sources_page))
        .route(endpoints::CATEGORIES_VIEW, get(get_categories_page));

    let api = Router::new()
        .route(endpoints::FETCH_EMAIL, get(fetch_email_endpoint))
        .route(endpoints::CREATE_SOURCE, post(create_source_endpoint))
        .route(endpoints::POST_SOURCE, post(create_source_form_endpoint))
        .route(endpoints::CREATE_USER, post(create_user_endpoint))
        .route(endpoints::POST_CATEGORY, post(create_category_endpoint))
        .route(
            endpoints::EDIT_LEDGER_ENTRY,
            post(edit_ledger_entry_endpoint),
        );

    pages
        .merge(api)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// The root path '/' redirects to the ledger of the default team.
async fn get_index_page() -> Redirect {
    Redirect::to(&endpoints::format_endpoint(
        endpoints::LEDGER_VIEW,
        DEFAULT_TEAM_ID,
    ))
}

#[cfg(test)]
mod router_tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{AppState, GmailClient, HttpTokenIssuer, IngestConfig, build_router};

    fn get_test_server() -> TestServer {
        let connection = Connection::open_in_memory().unwrap();
        let state = AppState::with_clients(
            connection,
            Arc::new(GmailClient::new("http://127.0.0.1:9")),
            Arc::new(HttpTokenIssuer::new("http://127.0.0.1:9")),
            IngestConfig::default(),
            "Etc/UTC",
        )
        .unwrap();

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn root_redirects_to_default_ledger() {
        let server = get_test_server();

        let response = server.get("/").await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/1/ledger");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/definitely/not/a/page")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_source_and_page_routes_are_wired() {
        let server = get_test_server();

        server
            .post("/api/create-user")
            .json(&json!({ "email": "a@example.com", "teamName": "Household" }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/create-source")
            .json(&json!({ "name": "Card alerts", "userId": 1 }))
            .await
            .assert_status(StatusCode::CREATED);

        server.get("/1/ledger").await.assert_status_ok();
        server.get("/1/sources").await.assert_status_ok();
        server.get("/1/categories").await.assert_status_ok();
    }
}
