//! Evaluation client seam.
//!
//! A client is built per request from an immutable datafile snapshot and is
//! never shared between requests. The real evaluation engine plugs in through
//! [`ClientFactory`]; [`DatafileClient`] is the built-in stand-in that reads
//! plain on/off switches from the datafile.

use std::sync::Arc;

use dfx_config::DatafileOptions;
use serde_json::Value;

use crate::datafile::Datafile;

pub trait EvaluationClient: Send + Sync {
    /// Whether `feature_key` is on for the given user identity.
    fn is_feature_enabled(&self, feature_key: &str, user_id: Option<&str>) -> bool;
}

pub trait ClientFactory: Send + Sync {
    fn create(&self, datafile: Arc<Datafile>, options: &DatafileOptions) -> Arc<dyn EvaluationClient>;
}

/// Reads `featureFlags: [{ "key": ..., "enabled": bool }]`.
///
/// A flag that is missing, or has no boolean `enabled`, is off. Identity is
/// ignored; there is no bucketing.
#[derive(Debug, Clone)]
pub struct DatafileClient {
    datafile: Arc<Datafile>,
}

impl DatafileClient {
    pub fn new(datafile: Arc<Datafile>) -> Self {
        Self { datafile }
    }

    pub fn datafile(&self) -> &Datafile {
        &self.datafile
    }
}

impl EvaluationClient for DatafileClient {
    fn is_feature_enabled(&self, feature_key: &str, _user_id: Option<&str>) -> bool {
        self.datafile
            .content()
            .get("featureFlags")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|flag| flag.get("key").and_then(Value::as_str) == Some(feature_key))
            .and_then(|flag| flag.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatafileClientFactory;

impl ClientFactory for DatafileClientFactory {
    fn create(&self, datafile: Arc<Datafile>, _options: &DatafileOptions) -> Arc<dyn EvaluationClient> {
        Arc::new(DatafileClient::new(datafile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(content: Value) -> Arc<dyn EvaluationClient> {
        DatafileClientFactory.create(Arc::new(Datafile::new(content)), &DatafileOptions::default())
    }

    #[test]
    fn enabled_flag_reports_true() {
        let c = client(json!({
            "featureFlags": [
                { "key": "other", "enabled": false },
                { "key": "my_feature", "enabled": true }
            ]
        }));
        assert!(c.is_feature_enabled("my_feature", Some("user-1")));
        assert!(!c.is_feature_enabled("other", Some("user-1")));
    }

    #[test]
    fn missing_flag_or_empty_datafile_is_off() {
        assert!(!client(json!({ "featureFlags": [] })).is_feature_enabled("x", None));
        assert!(!client(json!({})).is_feature_enabled("x", None));
        assert!(!client(json!({ "featureFlags": [{ "key": "x", "enabled": "yes" }] }))
            .is_feature_enabled("x", None));
    }
}
