//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    middleware::Next,
    response::Response,
};
use regex::Regex;
use std::sync::OnceLock;

const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged in full at the `debug` level.
/// Access tokens in form and JSON bodies are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = read_body(body).await;
    let body_text = redact_access_tokens(&String::from_utf8_lossy(&body_bytes));

    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        &body_text,
    );

    let response = next
        .run(Request::from_parts(parts, Body::from(body_bytes)))
        .await;

    let (parts, body) = response.into_parts();
    let body_bytes = read_body(body).await;
    let body_text = redact_access_tokens(&String::from_utf8_lossy(&body_bytes));

    log_body(&format!("Sending response: {}", parts.status), &body_text);

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body) -> Bytes {
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read body for logging: {error}");
            Bytes::new()
        }
    }
}

/// Replace the values of `access_token` and `accessToken` fields.
fn redact_access_tokens(text: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r#"(?P<key>"?access_?[tT]oken"?\s*[:=]\s*"?)[^"&,}\s]+"#).ok()
    });

    match pattern {
        Some(pattern) => pattern.replace_all(text, "${key}********").into_owned(),
        None => text.to_owned(),
    }
}

fn log_body(message: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        let end = (0..=LOG_BODY_LENGTH_LIMIT)
            .rev()
            .find(|&index| body.is_char_boundary(index))
            .unwrap_or(0);

        tracing::info!("{message}\nbody: {}...", &body[..end]);
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{message}\nbody: {body:?}");
    }
}
