//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs produce the same config_hash;
//! - key order inside a YAML document does not change the hash;
//! - a different value produces a different hash;
//! - an overlay that changes a value changes the hash.

use dfx_config::load_config_layers;

const BASE_YAML: &str = r#"
datafile:
  source_key: "abc123"
  log_level: "info"
  update_interval_ms: 300000
webhook:
  secret_env: "DFX_WEBHOOK_SECRET"
"#;

const BASE_YAML_REORDERED: &str = r#"
webhook:
  secret_env: "DFX_WEBHOOK_SECRET"
datafile:
  update_interval_ms: 300000
  log_level: "info"
  source_key: "abc123"
"#;

const OVERLAY_YAML: &str = r#"
datafile:
  update_interval_ms: 60000
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_config_layers(&[BASE_YAML]).unwrap();
    let b = load_config_layers(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_config_layers(&[BASE_YAML]).unwrap();
    let b = load_config_layers(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "reordered keys must canonicalize to the same hash"
    );
}

#[test]
fn overlay_changes_hash_and_effective_value() {
    let base = load_config_layers(&[BASE_YAML]).unwrap();
    let layered = load_config_layers(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, layered.config_hash);

    let opts = layered.datafile_options().unwrap();
    assert_eq!(opts.extra_u64("update_interval_ms"), Some(60000));
    assert_eq!(opts.source_key.as_deref(), Some("abc123"));
}

#[test]
fn hash_is_lowercase_sha256_hex() {
    let cfg = load_config_layers(&[BASE_YAML]).unwrap();
    assert_eq!(cfg.config_hash.len(), 64);
    assert!(cfg
        .config_hash
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}
