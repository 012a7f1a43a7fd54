//! HTTP client for the Gmail messages API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::gmail::{Message, MessageRef};

/// The production Gmail API host.
pub const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";

const MESSAGES_PATH: &str = "/gmail/v1/users/me/messages";

/// Errors returned by a [MailClient].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MailError {
    /// The access token was rejected, it has most likely expired.
    #[error("the access token was rejected")]
    Unauthorized,

    /// The API responded with an unexpected status code.
    #[error("mail API returned {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("mail API request failed: {0}")]
    Request(String),

    /// The response body was not in the expected format.
    #[error("could not decode mail API response: {0}")]
    Decode(String),
}

/// Read access to a user's mailbox.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// List the messages matching the search `query`.
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<MessageRef>, MailError>;

    /// Fetch the full message with the ID `message_id`.
    async fn get_message(&self, access_token: &str, message_id: &str)
    -> Result<Message, MailError>;
}

/// A [MailClient] that talks to the Gmail REST API.
#[derive(Debug, Clone)]
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

impl GmailClient {
    /// Create a client for the API at `base_url`, e.g. [DEFAULT_GMAIL_BASE_URL].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MailError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(MailError::Unauthorized);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());

            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|error| MailError::Decode(error.to_string()))
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<MessageRef>, MailError> {
        let response = self
            .client
            .get(self.url(MESSAGES_PATH))
            .bearer_auth(access_token)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|error| MailError::Request(error.to_string()))?;

        let list: ListMessagesResponse = Self::handle_response(response).await?;

        Ok(list.messages)
    }

    async fn get_message(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> Result<Message, MailError> {
        let response = self
            .client
            .get(self.url(&format!("{MESSAGES_PATH}/{message_id}")))
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|error| MailError::Request(error.to_string()))?;

        Self::handle_response(response).await
    }
}

#[cfg(test)]
mod gmail_client_tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    use super::{GmailClient, MailClient, MailError};

    #[tokio::test]
    async fn list_messages_sends_query_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "from:alerts@bank.com after:2025/01/13"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [
                    { "id": "m1", "threadId": "t1" },
                    { "id": "m2", "threadId": "t2" }
                ],
                "resultSizeEstimate": 2
            })))
            .expect(1)
            .mount(&server)
            .await;
        let client = GmailClient::new(server.uri());

        let messages = client
            .list_messages("token-123", "from:alerts@bank.com after:2025/01/13")
            .await
            .unwrap();

        let ids = messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn list_messages_without_matches_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })),
            )
            .mount(&server)
            .await;
        let client = GmailClient::new(server.uri());

        let messages = client.list_messages("token", "label:none").await.unwrap();

        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let client = GmailClient::new(server.uri());

        let result = client.list_messages("expired", "label:bank").await;

        assert_eq!(result.unwrap_err(), MailError::Unauthorized);
    }

    #[tokio::test]
    async fn other_failures_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;
        let client = GmailClient::new(server.uri());

        let result = client.get_message("token", "m1").await;

        assert_eq!(
            result.unwrap_err(),
            MailError::Status {
                status: 500,
                body: "backend error".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn get_message_decodes_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "threadId": "t1",
                "snippet": "You spent Rs. 250",
                "internalDate": "1736935200000",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{ "name": "Subject", "value": "Card alert" }],
                    "body": { "size": 17, "data": "WW91IHNwZW50IFJzLiAyNTA" }
                }
            })))
            .mount(&server)
            .await;
        let client = GmailClient::new(server.uri());

        let message = client.get_message("token", "m1").await.unwrap();

        assert_eq!(message.id, "m1");
        assert_eq!(message.subject(), "Card alert");
        assert_eq!(message.body_text(), "You spent Rs. 250");
    }
}
