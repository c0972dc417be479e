//! Fetch collaborator boundary.
//!
//! A [`DatafileSource`] owns everything about getting a datafile from its
//! origin: transport, polling cadence, retry and backoff. It announces progress
//! on a broadcast channel; the coordinator only listens and copies snapshots
//! into the store.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::datafile::Datafile;

/// Capacity of every source's event channel. A slow listener that falls
/// further behind sees `Lagged` and re-reads the latest snapshot.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// First successful load.
    Ready,
    /// A new datafile replaced the previous one.
    Update,
}

/// Result of a single fetch attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New content was stored and an event was emitted.
    Updated,
    /// Origin answered, content unchanged (or `304 Not Modified`).
    NotModified,
}

/// Errors a [`DatafileSource`] may report from a fetch.
#[derive(Debug)]
pub enum SourceError {
    /// Network or transport failure.
    Transport(String),
    /// Origin answered with a non-success status.
    Status(u16),
    /// Response body was not a JSON datafile.
    Decode(String),
    /// The source has been stopped.
    Stopped,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Status(code) => write!(f, "datafile origin returned status {code}"),
            SourceError::Decode(msg) => write!(f, "datafile decode error: {msg}"),
            SourceError::Stopped => write!(f, "datafile source stopped"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Background datafile acquisition.
///
/// Implementations must be object-safe and `Send + Sync`; the coordinator
/// holds an `Arc<dyn DatafileSource>` across task boundaries.
#[async_trait]
pub trait DatafileSource: Send + Sync {
    /// Human-readable name for logs (e.g. `"http-polling"`).
    fn name(&self) -> &'static str;

    /// Register a listener for [`SourceEvent`]s. Dropping the receiver unregisters it.
    fn subscribe(&self) -> broadcast::Receiver<SourceEvent>;

    /// Latest datafile held by the source, if any.
    fn current(&self) -> Option<Datafile>;

    /// Begin background acquisition. Calling it again while running is a no-op.
    fn start(&self);

    /// Fetch once, now, outside the regular cadence.
    async fn fetch_now(&self) -> Result<FetchOutcome, SourceError>;

    /// Release background resources. Safe to call when never started.
    fn stop(&self);
}
