//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use dagflow::config::EngineConfig;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.pool_cache_size, 8);
    assert_eq!(cfg.slow_threshold(), None);
}

#[test]
fn test_warmup_bounded_by_cache_size() {
    let cfg = EngineConfig {
        pool_cache_size: 2,
        warmup: 3,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_warmup_requires_pool() {
    let cfg = EngineConfig {
        disable_pool: true,
        warmup: 1,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_from_json_fills_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{"parallelism": 4, "slow_threshold_ms": 250}"#).unwrap();
    assert_eq!(cfg.parallelism, 4);
    assert_eq!(cfg.pool_cache_size, 8);
    assert_eq!(cfg.slow_threshold(), Some(Duration::from_millis(250)));
}

#[test]
fn test_config_from_json_rejects_garbage() {
    assert!(EngineConfig::from_json_str("{not json").is_err());
    assert!(EngineConfig::from_json_str(r#"{"pool_cache_size": 1, "warmup": 2}"#).is_err());
}

#[test]
fn test_config_from_lookup() {
    let cfg = EngineConfig::from_lookup(lookup(&[
        ("DAGFLOW_PARALLELISM", "3"),
        ("DAGFLOW_ENABLE_TRACKING", "true"),
        ("DAGFLOW_POOL_CACHE_SIZE", " 16 "),
        ("OTHER_PARALLELISM", "99"),
    ]))
    .unwrap();

    assert_eq!(cfg.parallelism, 3);
    assert!(cfg.enable_tracking);
    assert_eq!(cfg.pool_cache_size, 16);
}

#[test]
fn test_config_from_lookup_rejects_bad_number() {
    let err = EngineConfig::from_lookup(lookup(&[("DAGFLOW_WARMUP", "many")])).unwrap_err();
    assert!(err.contains("WARMUP"));
}
