//! HTTP polling datafile source.
//!
//! Fetches `url_template` (with `{sdk_key}` replaced by the source key) on a
//! fixed cadence, using `If-Modified-Since` so an unchanged datafile costs a
//! `304`. The first successful load emits [`SourceEvent::Ready`]; later loads
//! emit [`SourceEvent::Update`] only when the content actually changed.
//!
//! Failed fetches are retried after a growing delay taken from a fixed
//! backoff table; a success resets it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dfx_config::DatafileOptions;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::datafile::Datafile;
use crate::source::{DatafileSource, FetchOutcome, SourceError, SourceEvent, EVENT_CHANNEL_CAPACITY};

pub const DEFAULT_URL_TEMPLATE: &str = "https://cdn.optimizely.com/datafiles/{sdk_key}.json";
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on one fetch, connect through body. Holds the fetch gate, so it
/// also bounds how long a webhook-triggered fetch can queue.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry delay (seconds) by consecutive failure count; the last entry repeats.
const BACKOFF_SECS: &[u64] = &[0, 8, 16, 32, 64, 128, 256, 512];

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub source_key: String,
    pub url_template: String,
    pub update_interval: Duration,
    /// When false, polling stops after the first successful load.
    pub auto_update: bool,
    pub request_timeout: Duration,
}

impl PollingConfig {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            auto_update: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Read polling parameters from the forwarded option keys
    /// (`url_template`, `update_interval_ms`, `auto_update`, `request_timeout_ms`).
    pub fn from_options(opts: &DatafileOptions) -> Result<Self> {
        let Some(source_key) = opts.source_key.clone() else {
            bail!("CONFIG_INVALID: polling datafile source requires datafile.source_key");
        };

        let mut cfg = Self::new(source_key);
        if let Some(t) = opts.extra_str("url_template") {
            cfg.url_template = t.to_string();
        }
        if let Some(ms) = opts.extra_u64("update_interval_ms") {
            cfg.update_interval = clamp_interval(Duration::from_millis(ms));
        }
        if let Some(auto) = opts.extra_bool("auto_update") {
            cfg.auto_update = auto;
        }
        if let Some(ms) = opts.extra_u64("request_timeout_ms") {
            if ms == 0 {
                bail!("CONFIG_INVALID: datafile.request_timeout_ms must be > 0");
            }
            cfg.request_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }

    pub fn url(&self) -> String {
        self.url_template.replace("{sdk_key}", &self.source_key)
    }
}

fn clamp_interval(requested: Duration) -> Duration {
    if requested < MIN_UPDATE_INTERVAL {
        warn!(
            requested_ms = requested.as_millis() as u64,
            min_ms = MIN_UPDATE_INTERVAL.as_millis() as u64,
            "datafile update interval below minimum; using minimum"
        );
        MIN_UPDATE_INTERVAL
    } else {
        requested
    }
}

fn backoff_delay(consecutive_failures: usize) -> Duration {
    let idx = consecutive_failures.min(BACKOFF_SECS.len() - 1);
    Duration::from_secs(BACKOFF_SECS[idx]).max(MIN_UPDATE_INTERVAL)
}

pub struct HttpPollingSource {
    inner: Arc<PollingInner>,
}

struct PollingInner {
    config: PollingConfig,
    http: reqwest::Client,
    current: RwLock<Option<Datafile>>,
    last_modified: Mutex<Option<String>>,
    ready: AtomicBool,
    stopped: AtomicBool,
    events: broadcast::Sender<SourceEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes fetches so a webhook-triggered fetch and a scheduled poll
    /// never interleave their conditional-request state.
    fetch_gate: tokio::sync::Mutex<()>,
}

impl HttpPollingSource {
    /// Build with a client bounded by `config.request_timeout`.
    pub fn new(config: PollingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to create datafile HTTP client")?;
        Ok(Self::with_client(config, http))
    }

    /// Use a caller-supplied client; its timeout settings apply as-is.

    pub fn with_client(config: PollingConfig, http: reqwest::Client) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(PollingInner {
                config,
                http,
                current: RwLock::new(None),
                last_modified: Mutex::new(None),
                ready: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                events,
                task: Mutex::new(None),
                fetch_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.inner.config
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }
}

impl PollingInner {
    async fn fetch_once(&self) -> Result<FetchOutcome, SourceError> {
        let _gate = self.fetch_gate.lock().await;

        let mut req = self.http.get(self.config.url());
        let since = self.last_modified.lock().clone();
        if let Some(lm) = since {
            req = req.header(IF_MODIFIED_SINCE, lm);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        let datafile = Datafile::parse(&body).map_err(|e| SourceError::Decode(e.to_string()))?;

        *self.last_modified.lock() = last_modified;

        let revision = datafile.revision();
        let changed = {
            let mut cur = self.current.write();
            if cur.as_ref() == Some(&datafile) {
                false
            } else {
                *cur = Some(datafile);
                true
            }
        };

        let first_load = !self.ready.swap(true, Ordering::AcqRel);
        if first_load {
            info!(source_key = %self.config.source_key, revision = ?revision, "datafile ready");
            let _ = self.events.send(SourceEvent::Ready);
            return Ok(FetchOutcome::Updated);
        }
        if changed {
            info!(source_key = %self.config.source_key, revision = ?revision, "datafile updated");
            let _ = self.events.send(SourceEvent::Update);
            return Ok(FetchOutcome::Updated);
        }
        Ok(FetchOutcome::NotModified)
    }

    fn transport_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Transport(format!(
                "request timed out after {}ms",
                self.config.request_timeout.as_millis()
            ))
        } else {
            SourceError::Transport(e.to_string())
        }
    }

    async fn run(self: Arc<Self>) {
        let mut failures = 0usize;
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return;
            }
            let wait = match self.fetch_once().await {
                Ok(outcome) => {
                    failures = 0;
                    debug!(?outcome, "datafile poll complete");
                    if !self.config.auto_update {
                        debug!("datafile auto update disabled; polling stops after first load");
                        return;
                    }
                    self.config.update_interval
                }
                Err(e) => {
                    let delay = backoff_delay(failures);
                    failures += 1;
                    warn!(
                        source_key = %self.config.source_key,
                        error = %e,
                        retry_in_secs = delay.as_secs(),
                        "datafile fetch failed"
                    );
                    delay
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl DatafileSource for HttpPollingSource {
    fn name(&self) -> &'static str {
        "http-polling"
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.inner.events.subscribe()
    }

    fn current(&self) -> Option<Datafile> {
        self.inner.current.read().clone()
    }

    fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() {
            debug!("datafile polling already running");
            return;
        }
        self.inner.stopped.store(false, Ordering::Release);
        info!(
            url = %self.inner.config.url(),
            interval_secs = self.inner.config.update_interval.as_secs(),
            auto_update = self.inner.config.auto_update,
            "starting datafile polling"
        );
        *task = Some(tokio::spawn(Arc::clone(&self.inner).run()));
    }

    async fn fetch_now(&self) -> Result<FetchOutcome, SourceError> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(SourceError::Stopped);
        }
        self.inner.fetch_once().await
    }

    fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        if let Some(handle) = self.inner.task.lock().take() {
            handle.abort();
            info!("datafile polling stopped");
        }
    }
}

impl Drop for HttpPollingSource {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.task.lock().take() {
            handle.abort();
        }
    }
}
