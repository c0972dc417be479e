//! The single shared datafile cell.
//!
//! `DatafileStore` is the process-wide handle to the current datafile and its
//! readiness flag. It is cheap to clone (one `Arc`) and is passed explicitly to
//! every component that needs it.
//!
//! The cell is a `tokio::sync::watch` channel: readers borrow the current
//! value under the channel's lock, the writer swaps it with `send_replace`.
//! A `replace` that returns before a `get` starts is always observed by that
//! `get`, and a reader never sees a half-written value. Concurrent replaces are
//! last-writer-wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::datafile::Datafile;

/// Point-in-time view of the store, as seen by subscribers.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub datafile: Option<Arc<Datafile>>,
    /// Wall-clock time of the replace that produced this snapshot.
    /// `None` for the initial (caller-supplied or empty) value.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DatafileStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: watch::Sender<StoreSnapshot>,
    ready: AtomicBool,
}

impl Default for DatafileStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DatafileStore {
    /// Create the store with `ready = false` and an optional initial datafile.
    pub fn new(initial: Option<Datafile>) -> Self {
        let (current, _rx) = watch::channel(StoreSnapshot {
            datafile: initial.map(Arc::new),
            updated_at: None,
        });
        Self {
            inner: Arc::new(StoreInner {
                current,
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Current datafile, or `None` when nothing has been loaded or supplied.
    pub fn get(&self) -> Option<Arc<Datafile>> {
        self.inner.current.borrow().datafile.clone()
    }

    /// Current datafile, or the empty `{}` datafile.
    pub fn get_or_empty(&self) -> Arc<Datafile> {
        self.get().unwrap_or_else(|| Arc::new(Datafile::empty()))
    }

    /// Atomically swap in a new datafile and wake subscribers.
    pub fn replace(&self, datafile: Datafile) {
        self.inner.current.send_replace(StoreSnapshot {
            datafile: Some(Arc::new(datafile)),
            updated_at: Some(Utc::now()),
        });
    }

    /// Receiver notified on every [`replace`](Self::replace).
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.current.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.current.borrow().clone()
    }

    /// Flip the readiness flag. Set once the first fetch succeeded; never cleared.
    pub fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn revision(&self) -> Option<String> {
        self.inner
            .current
            .borrow()
            .datafile
            .as_ref()
            .and_then(|d| d.revision())
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.current.borrow().updated_at
    }
}
