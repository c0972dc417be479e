//! dfx-config
//!
//! Layered YAML configuration for the datafile daemon.
//!
//! Layers are applied in order onto an empty tree; a later layer wins key by
//! key, objects are merged recursively and everything else is replaced. The
//! result is fingerprinted (SHA-256 over compact JSON) so the daemon can log
//! exactly which configuration it booted with.
//!
//! The webhook secret never lives in config: `webhook.secret_env` holds the
//! NAME of an env var (see [`secrets`]). Loading refuses a `webhook:` section
//! that carries anything that looks like the secret itself.

pub mod options;
pub mod secrets;

pub use options::DatafileOptions;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Lower-case hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the `datafile:` section.
    pub fn datafile_options(&self) -> Result<DatafileOptions> {
        DatafileOptions::from_config_json(&self.config_json)
    }
}

/// Read each file and apply it as a layer, first to last.
pub fn load_config_files<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("failed to read config layer: {}", p.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    load_config_layers(&layers.iter().map(String::as_str).collect::<Vec<_>>())
}

/// Apply in-memory YAML layers, first to last. Empty layers are skipped.
pub fn load_config_layers(layers: &[&str]) -> Result<LoadedConfig> {
    let mut tree = Value::Object(Map::new());
    for (idx, raw) in layers.iter().enumerate() {
        let layer: Value = serde_yaml::from_str::<Option<Value>>(raw)
            .with_context(|| format!("CONFIG_INVALID: layer {idx} is not valid YAML"))?
            .unwrap_or(Value::Null);
        if !layer.is_null() {
            overlay(&mut tree, layer);
        }
    }

    check_webhook_section(&tree)?;

    // serde_json's Map keeps keys sorted, so compact output is stable for a tree.
    let canonical_json = serde_json::to_string(&tree).context("config serialize failed")?;
    Ok(LoadedConfig {
        config_hash: hex::encode(Sha256::digest(canonical_json.as_bytes())),
        canonical_json,
        config_json: tree,
    })
}

fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// `webhook.secret_env` must be an env var name, and no other webhook key may
/// carry a secret-named string.
fn check_webhook_section(tree: &Value) -> Result<()> {
    let Some(section) = tree.get("webhook") else {
        return Ok(());
    };
    let Some(section) = section.as_object() else {
        bail!("CONFIG_INVALID: webhook must be a mapping");
    };

    for (key, value) in section {
        if key == "secret_env" {
            match value.as_str() {
                Some(name) if is_env_var_name(name.trim()) => {}
                Some(_) => bail!("CONFIG_SECRET_DETECTED key=/webhook/secret_env value=REDACTED (expected an env var name)"),
                None => bail!("CONFIG_INVALID: webhook.secret_env must be a string"),
            }
        } else if key.to_ascii_lowercase().contains("secret") && value.is_string() {
            bail!("CONFIG_SECRET_DETECTED key=/webhook/{key} value=REDACTED (use webhook.secret_env)");
        }
    }
    Ok(())
}

fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
