//! Upstream body parsing.
//!
//! Handlers that care about the *form* a body was parsed into (the webhook
//! needs the literal text it must sign-check) read a [`ParsedBody`] extension
//! instead of consuming the body themselves. A route opts into a form by
//! adding one of these middlewares as a route layer.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::warn;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum ParsedBody {
    /// Literal UTF-8 text, byte-for-byte as received.
    Text(String),
    /// Decoded JSON value.
    Json(Value),
    /// Raw bytes that were not valid UTF-8.
    Binary(Bytes),
}

/// Parse the body as text (`ParsedBody::Text`, or `Binary` if not UTF-8).
pub async fn parse_body_as_text(req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let bytes = match read_body(body).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let parsed = match std::str::from_utf8(&bytes) {
        Ok(s) => ParsedBody::Text(s.to_string()),
        Err(_) => ParsedBody::Binary(bytes.clone()),
    };
    parts.extensions.insert(parsed);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Parse the body as JSON (`ParsedBody::Json`); `400` when it is not JSON.
pub async fn parse_body_as_json(req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let bytes = match read_body(body).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "request body is not valid JSON");
            return (StatusCode::BAD_REQUEST, "request body is not valid JSON").into_response();
        }
    };
    parts.extensions.insert(ParsedBody::Json(value));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn read_body(body: Body) -> Result<Bytes, Response> {
    axum::body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        warn!(error = %e, limit = MAX_BODY_BYTES, "request body unreadable or too large");
        (StatusCode::PAYLOAD_TOO_LARGE, "request body unreadable or too large").into_response()
    })
}
