//! Response types for dfx-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// Fetch collaborator feeding the store ("http-polling" | "static").
    pub source: String,
    /// true once the first fetch succeeded.
    pub ready: bool,
    /// Embedded revision of the datafile currently served, if any.
    pub revision: Option<String>,
    /// Time of the last store replace; null until the first one.
    pub updated_at: Option<DateTime<Utc>>,
}
