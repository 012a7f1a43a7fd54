//! Gmail message payloads and decoding of their headers and bodies.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};

const DEFAULT_SUBJECT: &str = "No Subject";

/// A message ID returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// The Gmail message ID.
    pub id: String,
    /// The ID of the conversation the message belongs to.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A full message as returned by `messages.get` with `format=full`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// The Gmail message ID.
    pub id: String,
    /// A short plain-text extract of the message.
    #[serde(default)]
    pub snippet: String,
    /// Milliseconds since the Unix epoch, as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    /// The root of the MIME tree.
    #[serde(default)]
    pub payload: MessagePart,
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// e.g. "text/plain" or "multipart/alternative".
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
    #[serde(default)]
    pub body: MessageBody,
    /// Child parts of a multipart node.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A single header of a MIME part.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// The body of a MIME part. `data` is base64url encoded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageBody {
    /// The encoded content, missing for multipart nodes.
    #[serde(default)]
    pub data: Option<String>,
}

impl Message {
    /// The value of the first top-level header called `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn subject(&self) -> &str {
        self.header("Subject")
            .filter(|subject| !subject.trim().is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
    }

    /// When the message was sent.
    ///
    /// Uses the `Date` header, falling back to the time Gmail received the
    /// message when the header is missing or malformed.
    pub fn date(&self) -> Option<OffsetDateTime> {
        self.header("Date")
            .and_then(parse_date_header)
            .or_else(|| self.internal_date())
    }

    fn internal_date(&self) -> Option<OffsetDateTime> {
        let millis: i128 = self.internal_date.as_deref()?.trim().parse().ok()?;

        OffsetDateTime::from_unix_timestamp_nanos(millis * 1_000_000).ok()
    }

    /// The readable text of the message.
    ///
    /// The first `text/plain` part is preferred, then the first `text/html`
    /// part, then the top-level body and finally the snippet.
    pub fn body_text(&self) -> String {
        self.payload
            .find_part("text/plain")
            .or_else(|| self.payload.find_part("text/html"))
            .and_then(MessagePart::decoded_body)
            .or_else(|| self.payload.decoded_body())
            .unwrap_or_else(|| self.snippet.clone())
    }
}

impl MessagePart {
    /// Depth-first search for the first part with `mime_type` and a body.
    fn find_part(&self, mime_type: &str) -> Option<&MessagePart> {
        if self.mime_type.eq_ignore_ascii_case(mime_type) && self.body.data.is_some() {
            return Some(self);
        }

        self.parts.iter().find_map(|part| part.find_part(mime_type))
    }

    fn decoded_body(&self) -> Option<String> {
        let data = self.body.data.as_deref()?;

        match URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(error) => {
                tracing::warn!("Could not decode message body: {error}");
                None
            }
        }
    }
}

/// Parse an RFC 2822 date, ignoring a trailing comment such as "(UTC)".
fn parse_date_header(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    let value = match value.rfind('(') {
        Some(comment_start) if value.ends_with(')') => value[..comment_start].trim_end(),
        _ => value,
    };

    OffsetDateTime::parse(value, &Rfc2822).ok()
}
