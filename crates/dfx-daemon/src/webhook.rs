//! Secure webhook: verify a signed "datafile changed" notification and kick
//! an immediate refresh.
//!
//! Checks run in a fixed order and the first failure ends the request:
//!
//! 1. shared secret configured        → else [`WebhookFault::MissingSecret`]
//! 2. body pre-parsed as literal text → else [`WebhookFault::BodyNotText`]
//! 3. `X-Hub-Signature` matches       → else [`WebhookFault::SignatureMismatch`]
//!
//! The handler returns a single `Result`, so exactly one response is produced
//! per request no matter how many conditions fail at once.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use dfx_datafile::signature::{verify_signature, SIGNATURE_HEADER};
use tracing::{debug, error, info, warn};

use crate::body::ParsedBody;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFault {
    /// No shared secret in the environment. Configuration fault.
    MissingSecret,
    /// The route was wired without a text body parser. Integration fault.
    BodyNotText,
    /// Signature header absent or wrong. Authentication rejection.
    SignatureMismatch,
}

impl WebhookFault {
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Text sent to the caller. Never includes the expected signature.
    pub fn public_message(&self) -> &'static str {
        match self {
            WebhookFault::MissingSecret => "Webhook secret not found",
            WebhookFault::BodyNotText => {
                "Webhook request body not parsed as text. Unable to verify secure webhook"
            }
            WebhookFault::SignatureMismatch => "Webhook payload determined not secure",
        }
    }
}

impl fmt::Display for WebhookFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookFault::MissingSecret => write!(f, "WEBHOOK_SECRET_MISSING"),
            WebhookFault::BodyNotText => write!(f, "WEBHOOK_BODY_NOT_TEXT"),
            WebhookFault::SignatureMismatch => write!(f, "WEBHOOK_SIGNATURE_MISMATCH"),
        }
    }
}

impl std::error::Error for WebhookFault {}

impl IntoResponse for WebhookFault {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

// ---------------------------------------------------------------------------
// POST /v1/webhook
// ---------------------------------------------------------------------------

pub async fn webhook_route(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Extension<ParsedBody>>,
) -> Result<StatusCode, WebhookFault> {
    let Some(secret) = st.webhook_secret.as_ref() else {
        error!(
            fault = %WebhookFault::MissingSecret,
            "webhook secret not found in environment; set the configured webhook secret env var"
        );
        return Err(WebhookFault::MissingSecret);
    };

    let raw = match body {
        Some(Extension(ParsedBody::Text(raw))) => raw,
        other => {
            error!(
                fault = %WebhookFault::BodyNotText,
                parsed_as = parsed_kind(other.as_ref().map(|Extension(b)| b)),
                "webhook body was not parsed as text; add parse_body_as_text to this route"
            );
            return Err(WebhookFault::BodyNotText);
        }
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    debug!(provided_signature = provided, "webhook request signature");

    if !verify_signature(secret.expose(), raw.as_bytes(), provided) {
        warn!(fault = %WebhookFault::SignatureMismatch, "webhook rejected");
        return Err(WebhookFault::SignatureMismatch);
    }

    info!("webhook verified; triggering immediate datafile refresh");
    // Detached: the response never waits on the fetch.
    drop(st.binder.coordinator().trigger_immediate_refresh());
    Ok(StatusCode::OK)
}

fn parsed_kind(body: Option<&ParsedBody>) -> &'static str {
    match body {
        None => "unparsed",
        Some(ParsedBody::Text(_)) => "text",
        Some(ParsedBody::Json(_)) => "json",
        Some(ParsedBody::Binary(_)) => "binary",
    }
}
