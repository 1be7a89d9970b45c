//! Append-only price history with size-triggered rotation
//!
//! One CSV file (`timestamp,symbol,price`) holds the active log. When it
//! grows past the configured maximum it is renamed to a timestamped backup
//! and a fresh file with a header takes its place. The swap happens under
//! the store lock, so readers never observe a half-rotated file.

use crate::error::WatchError;
use crate::models::PriceObservation;
use chrono::{NaiveDateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

const HEADER: &str = "timestamp,symbol,price\n";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn storage_err(context: &str, e: std::io::Error) -> WatchError {
    WatchError::Storage(format!("{}: {}", context, e))
}

pub struct HistoryStore {
    path: PathBuf,
    max_bytes: u64,
    file: Mutex<File>,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, WatchError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| storage_err("creating history directory", e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_err("opening history file", e))?;

        if file
            .metadata()
            .map_err(|e| storage_err("reading history metadata", e))?
            .len()
            == 0
        {
            file.write_all(HEADER.as_bytes())
                .map_err(|e| storage_err("writing history header", e))?;
            file.sync_data()
                .map_err(|e| storage_err("syncing history header", e))?;
            info!(path = %path.display(), "HistoryStore: created new history file {}", path.display());
        }

        Ok(Self {
            path,
            max_bytes,
            file: Mutex::new(file),
        })
    }

    /// Append one observation, rotating first if the active file is over the
    /// size limit. The record is synced to disk before returning.
    pub async fn append(&self, observation: &PriceObservation) -> Result<(), WatchError> {
        let mut file = self.file.lock().await;

        let size = file
            .metadata()
            .map_err(|e| storage_err("reading history metadata", e))?
            .len();
        if size > self.max_bytes {
            self.rotate_locked(&mut file)?;
        }

        let line = format!(
            "{},{},{}\n",
            observation.timestamp.format(TIMESTAMP_FORMAT),
            observation.symbol,
            observation.price
        );
        file.write_all(line.as_bytes())
            .map_err(|e| storage_err("appending observation", e))?;
        file.sync_data()
            .map_err(|e| storage_err("syncing observation", e))?;
        Ok(())
    }

    fn rotate_locked(&self, file: &mut File) -> Result<(), WatchError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let backup = self.backup_path(&stamp);

        std::fs::rename(&self.path, &backup)
            .map_err(|e| storage_err("renaming history file for rotation", e))?;

        let mut fresh = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage_err("creating fresh history file", e))?;
        fresh
            .write_all(HEADER.as_bytes())
            .map_err(|e| storage_err("writing fresh history header", e))?;
        fresh
            .sync_data()
            .map_err(|e| storage_err("syncing fresh history header", e))?;

        info!(
            backup = %backup.display(),
            "HistoryStore: rotated history log to {}",
            backup.display()
        );

        *file = fresh;
        Ok(())
    }

    fn backup_path(&self, stamp: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("history");
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("csv");
        self.path
            .with_file_name(format!("{}_backup_{}.{}", stem, stamp, ext))
    }

    /// The most recent `limit` observations in chronological order, pulling
    /// from rotated backups (newest first) when the active file has too few.
    pub async fn read_recent(&self, limit: usize) -> Result<Vec<PriceObservation>, WatchError> {
        let _guard = self.file.lock().await;

        let mut records = read_records(&self.path)?;
        if records.len() < limit {
            for backup in self.backup_files()? {
                if records.len() >= limit {
                    break;
                }
                let mut older = read_records(&backup)?;
                older.append(&mut records);
                records = older;
            }
        }

        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    /// Backup files sorted newest first; the timestamp in the name sorts
    /// lexicographically.
    fn backup_files(&self) -> Result<Vec<PathBuf>, WatchError> {
        let Some(parent) = self.path.parent() else {
            return Ok(Vec::new());
        };
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("history");
        let prefix = format!("{}_backup_", stem);

        let mut backups = Vec::new();
        let entries =
            std::fs::read_dir(parent).map_err(|e| storage_err("listing history backups", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| storage_err("listing history backups", e))?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                backups.push(entry.path());
            }
        }
        backups.sort();
        backups.reverse();
        Ok(backups)
    }
}

fn read_records(path: &Path) -> Result<Vec<PriceObservation>, WatchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        std::fs::read_to_string(path).map_err(|e| storage_err("reading history file", e))?;

    let mut records = Vec::new();
    for line in raw.lines() {
        if line.is_empty() || line == HEADER.trim_end() {
            continue;
        }
        match parse_record(line) {
            Some(observation) => records.push(observation),
            None => {
                warn!(line = %line, "HistoryStore: skipping malformed history line");
            }
        }
    }
    Ok(records)
}

fn parse_record(line: &str) -> Option<PriceObservation> {
    let mut parts = line.splitn(3, ',');
    let timestamp = parts.next()?;
    let symbol = parts.next()?;
    let price = parts.next()?;

    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    let price: f64 = price.parse().ok()?;
    Some(PriceObservation::new(symbol, price, timestamp))
}
