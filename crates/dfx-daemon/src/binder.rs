//! Per-request datafile binding.
//!
//! [`RequestBinder::bind`] is the setup step: it validates options, creates the
//! shared store and starts one refresh coordinator. [`bind_request`] is the
//! middleware that runs on every request: it snapshots the current datafile,
//! builds a fresh evaluation client from it, and attaches both to the request
//! as a [`RequestContext`] extension.
//!
//! Every `bind` call creates an independent store and coordinator. Build one
//! binder per process and clone it into routers.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dfx_config::DatafileOptions;
use dfx_datafile::{
    ClientFactory, Datafile, DatafileClientFactory, DatafileSource, DatafileStore,
    EvaluationClient, HttpPollingSource, PollingConfig, RefreshCoordinator, StaticSource,
};
use tracing::info;

/// Request-scoped view attached by [`bind_request`].
#[derive(Clone)]
pub struct RequestContext {
    /// Datafile current when the request arrived (`{}` if none yet).
    pub datafile: Arc<Datafile>,
    /// Client built from exactly that datafile.
    pub client: Arc<dyn EvaluationClient>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("revision", &self.datafile.revision())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct RequestBinder {
    options: Arc<DatafileOptions>,
    store: DatafileStore,
    coordinator: Arc<RefreshCoordinator>,
    factory: Arc<dyn ClientFactory>,
}

impl RequestBinder {
    /// Validate `options`, seed the store with the initial datafile (not ready),
    /// and start a coordinator over `source`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        options: DatafileOptions,
        source: Arc<dyn DatafileSource>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        options.validate()?;

        let store = DatafileStore::new(options.datafile.clone().map(Datafile::new));
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), source));
        coordinator.start();

        info!(
            source = coordinator.source_name(),
            source_key = ?options.source_key,
            has_initial = options.datafile.is_some(),
            "datafile binder ready"
        );

        Ok(Self {
            options: Arc::new(options),
            store,
            coordinator,
            factory,
        })
    }

    /// `bind` with the default collaborators: HTTP polling when a source key
    /// is configured, otherwise the initial datafile as a static source.
    pub fn from_options(options: DatafileOptions) -> Result<Self> {
        options.validate()?;

        let source: Arc<dyn DatafileSource> = if options.source_key.is_some() {
            let cfg = PollingConfig::from_options(&options)
                .context("failed to build datafile polling config")?;
            Arc::new(HttpPollingSource::new(cfg)?)
        } else {
            Arc::new(StaticSource::new(options.datafile.clone().map(Datafile::new)))
        };

        Self::bind(options, source, Arc::new(DatafileClientFactory))
    }

    pub fn store(&self) -> &DatafileStore {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn options(&self) -> &DatafileOptions {
        &self.options
    }

    /// Snapshot the store and build a client bound to that snapshot.
    pub fn context_for_request(&self) -> RequestContext {
        let datafile = self.store.get_or_empty();
        let client = self.factory.create(Arc::clone(&datafile), &self.options);
        RequestContext { datafile, client }
    }
}

/// Middleware: attach a [`RequestContext`] and always continue.
///
/// Wire with `axum::middleware::from_fn_with_state(binder, bind_request)`.
pub async fn bind_request(
    State(binder): State<RequestBinder>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = binder.context_for_request();
    req.extensions_mut().insert(ctx);
    next.run(req).await
}
