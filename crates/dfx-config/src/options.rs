//! Initialization options for the datafile binder and its fetch collaborator.
//!
//! Read from the `datafile:` section of the layered config. Keys this crate
//! does not know about are kept verbatim in [`DatafileOptions::extra`] and
//! forwarded to the evaluation client factory and the fetch collaborator.

use std::fs;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatafileOptions {
    /// Identifies which remote datafile to track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,

    /// Pre-supplied initial datafile (`datafile.initial` in YAML).
    #[serde(default, rename = "initial", skip_serializing_if = "Option::is_none")]
    pub datafile: Option<Value>,

    /// File alternative to `initial`; loaded by [`DatafileOptions::from_config_json`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_path: Option<String>,

    /// Verbosity for collaborator logging (an `EnvFilter` directive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Everything else, forwarded verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatafileOptions {
    /// Build options from the merged config JSON.
    ///
    /// A missing `datafile:` section yields empty options (which then fail
    /// [`validate`](Self::validate)). Blank strings are treated as absent.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let section = config_json
            .pointer("/datafile")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut opts: DatafileOptions =
            serde_json::from_value(section).context("CONFIG_INVALID: datafile section")?;

        opts.source_key = non_blank(opts.source_key.take());
        opts.initial_path = non_blank(opts.initial_path.take());
        opts.log_level = non_blank(opts.log_level.take());

        if opts.datafile.is_none() {
            if let Some(path) = opts.initial_path.as_deref() {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read initial datafile: {path}"))?;
                let v: Value = serde_json::from_str(&raw)
                    .with_context(|| format!("initial datafile is not valid JSON: {path}"))?;
                opts.datafile = Some(v);
            }
        }

        Ok(opts)
    }

    /// Setup-time check: something must tell us where the datafile comes from.
    pub fn validate(&self) -> Result<()> {
        if self.source_key.is_none() && self.datafile.is_none() {
            bail!(
                "CONFIG_INVALID: datafile.source_key or an initial datafile \
                 (datafile.initial / datafile.initial_path) is required"
            );
        }
        Ok(())
    }

    /// Log filter directive, defaulting to `info`.
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.and_then(|v| {
        let t = v.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}
