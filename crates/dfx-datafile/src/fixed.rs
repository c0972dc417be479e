//! A source that never fetches: serves the datafile it was built with.
//!
//! Used when the daemon is configured with an initial datafile but no source key.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::datafile::Datafile;
use crate::source::{DatafileSource, FetchOutcome, SourceError, SourceEvent, EVENT_CHANNEL_CAPACITY};

pub struct StaticSource {
    datafile: Option<Datafile>,
    events: broadcast::Sender<SourceEvent>,
}

impl StaticSource {
    pub fn new(datafile: Option<Datafile>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { datafile, events }
    }
}

#[async_trait]
impl DatafileSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }

    fn current(&self) -> Option<Datafile> {
        self.datafile.clone()
    }

    fn start(&self) {
        if self.datafile.is_some() {
            // No listeners is fine; nothing to deliver to.
            let _ = self.events.send(SourceEvent::Ready);
        } else {
            debug!("static datafile source has no datafile; never ready");
        }
    }

    async fn fetch_now(&self) -> Result<FetchOutcome, SourceError> {
        Ok(FetchOutcome::NotModified)
    }

    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn start_announces_ready_when_datafile_present() {
        let src = StaticSource::new(Some(Datafile::new(json!({ "revision": "1" }))));
        let mut rx = src.subscribe();

        src.start();

        assert_eq!(rx.recv().await.unwrap(), SourceEvent::Ready);
        assert_eq!(src.current().unwrap().revision().as_deref(), Some("1"));
        assert_eq!(src.fetch_now().await.unwrap(), FetchOutcome::NotModified);
    }

    #[test]
    fn start_without_datafile_is_silent() {
        let src = StaticSource::new(None);
        let mut rx = src.subscribe();
        src.start();
        assert!(rx.try_recv().is_err());
    }
}
