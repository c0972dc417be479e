//! Bridges a [`DatafileSource`] into the [`DatafileStore`].
//!
//! The coordinator does no fetching of its own. It subscribes to the source's
//! events once, copies the source's snapshot into the store on every `Ready`
//! or `Update`, and flips the store's readiness flag on `Ready`. It is the
//! only writer of the store.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::{DatafileSource, SourceEvent};
use crate::store::DatafileStore;

pub struct RefreshCoordinator {
    store: DatafileStore,
    source: Arc<dyn DatafileSource>,
    /// Event-listener task; `Some` while started.
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    pub fn new(store: DatafileStore, source: Arc<dyn DatafileSource>) -> Self {
        Self {
            store,
            source,
            listener: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &DatafileStore {
        &self.store
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn is_running(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Subscribe to the source and start it.
    ///
    /// Returns `false` (and does nothing) if already started. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            debug!(source = self.source.name(), "refresh coordinator already started");
            return false;
        }

        // Subscribe before starting the source so the first Ready is never missed.
        let mut events = self.source.subscribe();
        let store = self.store.clone();
        let source = Arc::clone(&self.source);

        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => apply_event(&store, source.as_ref(), event),
                    Err(RecvError::Lagged(skipped)) => {
                        // The snapshot is always the latest, so one replace covers
                        // every skipped event. A snapshot only exists after the
                        // first load, so a skipped Ready is applied as well.
                        warn!(skipped, "datafile event listener lagged; applying latest");
                        apply_event(&store, source.as_ref(), SourceEvent::Ready);
                    }
                    Err(RecvError::Closed) => {
                        debug!("datafile source event channel closed");
                        return;
                    }
                }
            }
        }));

        self.source.start();
        info!(source = self.source.name(), "refresh coordinator started");
        true
    }

    /// Ask the source for an out-of-band fetch.
    ///
    /// Never fails: the fetch runs on its own task and errors are logged. The
    /// returned handle may be awaited or dropped.
    pub fn trigger_immediate_refresh(&self) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            match source.fetch_now().await {
                Ok(outcome) => debug!(?outcome, "immediate datafile refresh complete"),
                Err(e) => warn!(source = source.name(), error = %e, "immediate datafile refresh failed"),
            }
        })
    }

    /// Unsubscribe and release the source. The store keeps its last datafile.
    pub fn stop(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!(source = self.source.name(), "refresh coordinator stopped");
        }
        self.source.stop();
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}

fn apply_event(store: &DatafileStore, source: &dyn DatafileSource, event: SourceEvent) {
    let Some(datafile) = source.current() else {
        warn!(?event, "datafile source announced an event without a datafile");
        return;
    };
    let revision = datafile.revision();
    store.replace(datafile);
    if event == SourceEvent::Ready {
        store.mark_ready();
    }
    debug!(?event, revision = ?revision, "datafile store replaced");
}
