//! Unit tests for threshold loading and the runtime registry

use bursawatch::config::{load_thresholds, ThresholdRegistry};
use bursawatch::models::{is_valid_symbol, ThresholdLimits};
use std::collections::HashMap;

#[test]
fn bursa_symbol_format_is_enforced() {
    assert!(is_valid_symbol("5285.KL"));
    assert!(is_valid_symbol("0001.KL"));

    assert!(!is_valid_symbol("528.KL"));
    assert!(!is_valid_symbol("12345.KL"));
    assert!(!is_valid_symbol("ABCD.KL"));
    assert!(!is_valid_symbol("5285.NY"));
    assert!(!is_valid_symbol("5285KL"));
    assert!(!is_valid_symbol(""));
}

#[test]
fn threshold_limits_require_up_above_down_above_zero() {
    assert!(ThresholdLimits::new(10.50, 9.80).validate().is_ok());

    assert!(ThresholdLimits::new(9.80, 10.50).validate().is_err());
    assert!(ThresholdLimits::new(10.0, 10.0).validate().is_err());
    assert!(ThresholdLimits::new(10.0, 0.0).validate().is_err());
    assert!(ThresholdLimits::new(10.0, -1.0).validate().is_err());
    assert!(ThresholdLimits::new(f64::NAN, 1.0).validate().is_err());
}

#[test]
fn load_thresholds_keeps_valid_entries_and_drops_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thresholds.json");
    std::fs::write(
        &path,
        r#"{
            "5285.KL": {"up": 10.50, "down": 9.80},
            "1234.KL": {"up": 1.00, "down": 2.00},
            "not-a-symbol": {"up": 5.00, "down": 4.00}
        }"#,
    )
    .unwrap();

    let thresholds = load_thresholds(&path).unwrap();
    assert_eq!(thresholds.len(), 1);
    assert_eq!(thresholds["5285.KL"], ThresholdLimits::new(10.50, 9.80));
}

#[test]
fn load_thresholds_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_thresholds(&dir.path().join("missing.json")).is_err());
}

#[test]
fn load_thresholds_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thresholds.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(load_thresholds(&path).is_err());
}

#[tokio::test]
async fn registry_update_is_validated() {
    let registry = ThresholdRegistry::new(HashMap::new());

    registry
        .update("5285.KL", ThresholdLimits::new(10.50, 9.80))
        .await
        .unwrap();
    assert_eq!(
        registry.get("5285.KL").await,
        Some(ThresholdLimits::new(10.50, 9.80))
    );

    assert!(registry
        .update("5285.KL", ThresholdLimits::new(9.0, 10.0))
        .await
        .is_err());
    assert!(registry
        .update("bogus", ThresholdLimits::new(10.50, 9.80))
        .await
        .is_err());

    // Failed updates leave the stored value untouched.
    assert_eq!(
        registry.get("5285.KL").await,
        Some(ThresholdLimits::new(10.50, 9.80))
    );
}

#[tokio::test]
async fn registry_reload_replaces_the_mapping() {
    let mut initial = HashMap::new();
    initial.insert("5285.KL".to_string(), ThresholdLimits::new(10.50, 9.80));
    let registry = ThresholdRegistry::new(initial);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thresholds.json");
    std::fs::write(&path, r#"{"1155.KL": {"up": 40.00, "down": 30.00}}"#).unwrap();

    registry.replace(load_thresholds(&path).unwrap()).await;

    assert!(registry.get("5285.KL").await.is_none());
    assert_eq!(
        registry.get("1155.KL").await,
        Some(ThresholdLimits::new(40.00, 30.00))
    );
}

#[tokio::test]
async fn registry_snapshot_is_detached_from_later_updates() {
    let mut initial = HashMap::new();
    initial.insert("5285.KL".to_string(), ThresholdLimits::new(10.50, 9.80));
    let registry = ThresholdRegistry::new(initial);

    let snapshot = registry.snapshot().await;
    registry
        .update("5285.KL", ThresholdLimits::new(12.00, 11.00))
        .await
        .unwrap();

    assert_eq!(snapshot["5285.KL"], ThresholdLimits::new(10.50, 9.80));
    assert_eq!(
        registry.get("5285.KL").await,
        Some(ThresholdLimits::new(12.00, 11.00))
    );
}
