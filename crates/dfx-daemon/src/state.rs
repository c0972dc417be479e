//! Shared runtime state for dfx-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The datafile store and
//! coordinator live inside the [`RequestBinder`]; this module only groups
//! them with build metadata and the resolved webhook secret.

use tokio::task::JoinHandle;
use tracing::info;

use dfx_config::secrets::WebhookSecret;
use dfx_datafile::DatafileStore;

use crate::binder::RequestBinder;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    /// Store, coordinator and client factory.
    pub binder: RequestBinder,
    /// Resolved once at boot; `None` makes the webhook route refuse requests.
    pub webhook_secret: Option<WebhookSecret>,
}

impl AppState {
    pub fn new(binder: RequestBinder, webhook_secret: Option<WebhookSecret>) -> Self {
        Self {
            build: BuildInfo {
                service: "dfx-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            binder,
            webhook_secret,
        }
    }
}

/// Stop the refresh coordinator, then the revision logger, and wait for the
/// logger task to finish.
pub async fn shutdown(binder: &RequestBinder, revision_logger: JoinHandle<()>) {
    binder.coordinator().stop();
    revision_logger.abort();
    let _ = revision_logger.await;
}

/// Spawn a background task that logs every datafile replace.
pub fn spawn_revision_logger(store: &DatafileStore) -> JoinHandle<()> {
    let mut rx = store.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            info!(
                revision = ?snap.datafile.as_ref().and_then(|d| d.revision()),
                updated_at = ?snap.updated_at,
                "datafile revision active"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dfx_config::DatafileOptions;
    use dfx_datafile::{Datafile, DatafileClientFactory, DatafileSource, StaticSource};
    use serde_json::json;

    #[tokio::test]
    async fn shutdown_stops_coordinator_and_revision_logger() {
        let initial = json!({ "revision": "1" });
        let opts = DatafileOptions {
            datafile: Some(initial.clone()),
            ..DatafileOptions::default()
        };
        let src: Arc<dyn DatafileSource> = Arc::new(StaticSource::new(Some(Datafile::new(initial))));
        let binder = RequestBinder::bind(opts, src, Arc::new(DatafileClientFactory)).unwrap();

        let logger = spawn_revision_logger(binder.store());
        let abort = logger.abort_handle();
        assert!(binder.coordinator().is_running());

        shutdown(&binder, logger).await;

        assert!(!binder.coordinator().is_running());
        assert!(abort.is_finished());
    }
}
