use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::config::Config;
use crate::error::{Context, Result};
use crate::fetch::SamplingRound;

pub mod history;

pub use history::{decode_history, encode_round, parse_timestamp, History, LoadReport};

/// Append-only CSV store holding every sampled round.
///
/// Appends and loads share one lock, and a whole round goes out in a single
/// buffered write. A reader in another process can still catch an append
/// midway; the loader ignores an unterminated final record for that case.
pub struct HistoryStore {
    path: PathBuf,
    value_column: String,
    io_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, value_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value_column: value_column.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.history_file.clone(),
            config.market.interval.value_column(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    /// Append every sample of `round`; the header is written only when the file is new or empty.
    ///
    /// Not idempotent: appending the same round twice duplicates its rows, which
    /// [`HistoryStore::load`] collapses again.
    pub fn append(&self, round: &SamplingRound) -> Result<usize> {
        if round.samples.is_empty() {
            debug!("Round at {} has no samples to persist", round.sampled_at);
            return Ok(0);
        }

        let _guard = self.lock();
        self.ensure_parent_dir()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file {}", self.path.display()))?;
        let needs_header = file
            .metadata()
            .with_context(|| format!("Failed to stat history file {}", self.path.display()))?
            .len()
            == 0;

        let buffer = encode_round(round, &self.value_column, needs_header)?;
        file.write_all(&buffer)
            .with_context(|| format!("Failed to append to history file {}", self.path.display()))?;
        file.flush()?;

        info!(
            "Persisted {} samples to {}",
            round.samples.len(),
            self.path.display()
        );
        Ok(round.samples.len())
    }

    /// Read the full history; a missing file is an empty history.
    pub fn load(&self) -> Result<(History, LoadReport)> {
        let _guard = self.lock();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok((History::default(), LoadReport::default()));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!(
                        "Failed to open history file {}",
                        self.path.display()
                    ))
                    .into());
            }
        };

        decode_history(BufReader::new(file), &self.value_column)
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Sample;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn round(stamp: DateTime<Utc>, values: &[(&str, f64)]) -> SamplingRound {
        let mut round = SamplingRound::new(stamp);
        for (symbol, value) in values {
            round.samples.push(Sample {
                symbol: symbol.to_string(),
                value: *value,
                sampled_at: stamp,
            });
        }
        round
    }

    #[test]
    fn appends_without_rewriting_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("data").join("rsi.csv"), "15m RSI");
        let t0 = Utc.with_ymd_and_hms(2024, 8, 14, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(3);

        store.append(&round(t0, &[("A", 72.0), ("B", 28.0)])).unwrap();
        let first = fs::read_to_string(store.path()).unwrap();
        store.append(&round(t1, &[("A", 75.0)])).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();

        assert!(second.starts_with(&first));
        assert_eq!(second.matches("Symbol,Timestamp").count(), 1);

        let (history, report) = store.load().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(report.rows_dropped, 0);
        assert_eq!(history.latest_timestamp(), Some(t1));
    }

    #[test]
    fn every_row_of_a_round_shares_its_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI");
        let stamp = Utc.with_ymd_and_hms(2024, 8, 14, 10, 0, 0).unwrap();

        store
            .append(&round(stamp, &[("A", 10.0), ("B", 20.0), ("C", 30.0)]))
            .unwrap();

        let (history, _) = store.load().unwrap();
        assert!(history.samples.iter().all(|s| s.sampled_at == stamp));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent.csv"), "15m RSI");

        let (history, report) = store.load().unwrap();
        assert!(history.is_empty());
        assert_eq!(report, LoadReport::default());
    }

    #[test]
    fn empty_round_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI");

        assert_eq!(store.append(&SamplingRound::new(Utc::now())).unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn unwritable_storage_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), "15m RSI");

        let result = store.append(&round(Utc::now(), &[("A", 50.0)]));
        assert!(result.is_err());
    }

    #[test]
    fn reads_files_written_by_earlier_tooling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rsi.csv");
        fs::write(
            &path,
            "Symbol,Timestamp,15m RSI\n\
             BTCUSDT.P,2024-08-14 10:03:00.123456+00:00,55.2\n",
        )
        .unwrap();
        let store = HistoryStore::new(&path, "15m RSI");

        let (history, _) = store.load().unwrap();
        assert_eq!(history.len(), 1);
        assert!((history.samples[0].value - 55.2).abs() < 1e-9);
    }
}
