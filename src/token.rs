//! Obtaining fresh mailbox access tokens once a stored token has expired.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    user::{User, update_access_token},
};

const FETCH_TOKEN_PATH: &str = "/api/fetch-token";

/// Errors returned by a [TokenIssuer].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    /// The request could not be sent or the response could not be read.
    #[error("token request failed: {0}")]
    Request(String),

    /// The issuer responded with a status other than 200.
    #[error("token issuer responded with status {0}")]
    Rejected(u16),

    /// The issuer's response did not contain a token.
    #[error("token issuer response did not contain an access token")]
    MissingToken,
}

/// Issues new access tokens for a user's mailbox.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Request a new access token for the user with `email`.
    async fn issue_token(&self, email: &str) -> Result<String, TokenError>;
}

/// A [TokenIssuer] that calls the token endpoint of the account service.
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct FetchTokenRequest<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchTokenResponse {
    access_token: Option<String>,
}

impl HttpTokenIssuer {
    /// Create an issuer for the account service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue_token(&self, email: &str) -> Result<String, TokenError> {
        let response = self
            .client
            .post(format!("{}{FETCH_TOKEN_PATH}", self.base_url))
            .json(&FetchTokenRequest { email })
            .send()
            .await
            .map_err(|error| TokenError::Request(error.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(TokenError::Rejected(response.status().as_u16()));
        }

        let body: FetchTokenResponse = response
            .json()
            .await
            .map_err(|error| TokenError::Request(error.to_string()))?;

        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::MissingToken)
    }
}

/// Get a new access token for `user` and store it.
///
/// The issuer is called exactly once, a failed request is not retried.
///
/// # Errors
///
/// This function will return a:
/// - [Error::TokenRefresh] if the issuer did not provide a token,
/// - [Error::NotFound] if the user no longer exists,
/// - [Error::DatabaseLockError] or [Error::SqlError] if the token could not be stored.
pub async fn refresh_access_token(
    user: &User,
    token_issuer: &dyn TokenIssuer,
    db_connection: &Mutex<Connection>,
) -> Result<String, Error> {
    let access_token = token_issuer.issue_token(&user.email).await?;

    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;
    update_access_token(user.id, &access_token, &connection)?;

    tracing::info!("Refreshed the access token for user #{}", user.id);

    Ok(access_token)
}

#[cfg(test)]
mod token_tests {
    use std::sync::Mutex;

    use rusqlite::Connection;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    use crate::{
        Error, initialize_db,
        team::create_team,
        user::{create_user, get_user_by_id},
    };

    use super::{HttpTokenIssuer, TokenError, TokenIssuer, refresh_access_token};

    #[tokio::test]
    async fn issues_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fetch-token"))
            .and(body_json(json!({ "email": "a@example.com" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let issuer = HttpTokenIssuer::new(server.uri());

        assert_eq!(issuer.issue_token("a@example.com").await, Ok("fresh".to_owned()));
    }

    #[tokio::test]
    async fn non_200_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "accessToken": "x" })))
            .mount(&server)
            .await;
        let issuer = HttpTokenIssuer::new(server.uri());

        assert_eq!(
            issuer.issue_token("a@example.com").await,
            Err(TokenError::Rejected(201))
        );
    }

    #[tokio::test]
    async fn missing_token_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let issuer = HttpTokenIssuer::new(server.uri());

        assert_eq!(
            issuer.issue_token("a@example.com").await,
            Err(TokenError::MissingToken)
        );
    }

    fn get_db_with_user() -> Mutex<Connection> {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let team = create_team("Household", &connection).unwrap();
        create_user("a@example.com", Some("stale"), team.id, &connection).unwrap();

        Mutex::new(connection)
    }

    #[tokio::test]
    async fn refresh_stores_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fetch-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let issuer = HttpTokenIssuer::new(server.uri());
        let db_connection = get_db_with_user();
        let user = get_user_by_id(1, &db_connection.lock().unwrap()).unwrap();

        let token = refresh_access_token(&user, &issuer, &db_connection).await;

        assert_eq!(token, Ok("fresh".to_owned()));
        let user = get_user_by_id(1, &db_connection.lock().unwrap()).unwrap();
        assert_eq!(user.access_token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let issuer = HttpTokenIssuer::new(server.uri());
        let db_connection = get_db_with_user();
        let user = get_user_by_id(1, &db_connection.lock().unwrap()).unwrap();

        let result = refresh_access_token(&user, &issuer, &db_connection).await;

        assert_eq!(result, Err(Error::TokenRefresh(TokenError::Rejected(500))));
        let user = get_user_by_id(1, &db_connection.lock().unwrap()).unwrap();
        assert_eq!(user.access_token.as_deref(), Some("stale"));
    }
}
