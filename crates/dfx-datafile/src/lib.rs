//! dfx-datafile
//!
//! Datafile freshness and secure-update core.
//!
//! - [`DatafileStore`]: the one shared, atomically replaced datafile cell.
//! - [`RefreshCoordinator`]: the store's only writer; listens to a
//!   [`DatafileSource`] and copies each new snapshot in.
//! - [`signature`]: HMAC-SHA1 webhook signatures.
//! - [`client`]: per-request evaluation client seam.
//!
//! No HTTP framework types live here; the daemon crate wires these into axum.

pub mod client;
pub mod coordinator;
pub mod datafile;
pub mod fixed;
pub mod polling;
pub mod signature;
pub mod source;
pub mod store;

pub use client::{ClientFactory, DatafileClient, DatafileClientFactory, EvaluationClient};
pub use coordinator::RefreshCoordinator;
pub use datafile::Datafile;
pub use fixed::StaticSource;
pub use polling::{HttpPollingSource, PollingConfig};
pub use source::{DatafileSource, FetchOutcome, SourceError, SourceEvent};
pub use store::{DatafileStore, StoreSnapshot};
