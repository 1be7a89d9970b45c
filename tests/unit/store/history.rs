//! Unit tests for the history store

use bursawatch::models::PriceObservation;
use bursawatch::store::HistoryStore;
use chrono::{Duration, TimeZone, Utc};

fn obs(minute_offset: i64, price: f64) -> PriceObservation {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    PriceObservation::new("5285.KL", price, base + Duration::minutes(minute_offset))
}

fn backup_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("history_backup_")
        })
        .count()
}

#[tokio::test]
async fn append_then_read_recent_returns_newest_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.csv"), 10 * 1024 * 1024).unwrap();

    store.append(&obs(0, 10.2)).await.unwrap();
    store.append(&obs(5, 10.55)).await.unwrap();
    store.append(&obs(8, 10.6)).await.unwrap();

    let recent = store.read_recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].price, 10.55);
    assert_eq!(recent[1].price, 10.6);

    let all = store.read_recent(10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn read_recent_on_fresh_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.csv"), 1024).unwrap();
    assert!(store.read_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn observations_round_trip_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.csv"), 1024 * 1024).unwrap();

    let original = obs(3, 10.55);
    store.append(&original).await.unwrap();

    let recent = store.read_recent(1).await.unwrap();
    assert_eq!(recent[0], original);
}

#[tokio::test]
async fn oversize_file_rotates_exactly_once_and_keeps_content() {
    let dir = tempfile::tempdir().unwrap();
    // Small cap so a handful of ~30-byte records crosses it.
    let store = HistoryStore::open(dir.path().join("history.csv"), 200).unwrap();

    for i in 0..10 {
        store.append(&obs(i, 10.0 + i as f64 * 0.1)).await.unwrap();
    }

    assert_eq!(backup_count(dir.path()), 1);

    // Active file dropped back below the cap after rotation.
    let active_len = std::fs::metadata(dir.path().join("history.csv"))
        .unwrap()
        .len();
    assert!(active_len <= 200, "active file is {} bytes", active_len);

    // Everything written is still recoverable across active + backup.
    let all = store.read_recent(100).await.unwrap();
    assert_eq!(all.len(), 10);
    assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(all[0].price, 10.0);
    assert!((all[9].price - 10.9).abs() < 1e-9);
}

#[tokio::test]
async fn reopening_an_existing_file_does_not_duplicate_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");

    {
        let store = HistoryStore::open(&path, 1024 * 1024).unwrap();
        store.append(&obs(0, 10.2)).await.unwrap();
    }

    let store = HistoryStore::open(&path, 1024 * 1024).unwrap();
    store.append(&obs(1, 10.3)).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        raw.matches("timestamp,symbol,price").count(),
        1,
        "header must appear once"
    );
    assert_eq!(store.read_recent(10).await.unwrap().len(), 2);
}
