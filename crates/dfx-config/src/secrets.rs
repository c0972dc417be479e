//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"DFX_WEBHOOK_SECRET"`).
//! - At startup, callers invoke [`resolve_webhook_secret`] once and pass the
//!   result into constructors; never scatter `std::env::var` calls around.
//! - `Debug` impls on secret-containing types **redact** values.
//! - Messages reference the env var **NAME**, never the value.
//!
//! A missing webhook secret is not a boot failure: the daemon still serves
//! requests, and the webhook route answers with a configuration-fault response.

use serde_json::Value;

/// Env var consulted when the config does not name one.
pub const DEFAULT_WEBHOOK_SECRET_ENV: &str = "DFX_WEBHOOK_SECRET";

/// Shared secret used to authenticate webhook payloads.
///
/// **Value is redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(<REDACTED>)")
    }
}

/// Name of the env var that holds the webhook secret (`/webhook/secret_env`).
pub fn webhook_secret_env_name(config_json: &Value) -> String {
    config_json
        .pointer("/webhook/secret_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_WEBHOOK_SECRET_ENV)
        .to_string()
}

/// Resolve the webhook secret from the environment.
///
/// Returns `None` when the named variable is unset or blank.
pub fn resolve_webhook_secret(config_json: &Value) -> Option<WebhookSecret> {
    resolve_env(&webhook_secret_env_name(config_json)).map(WebhookSecret)
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
