use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::fetch::Sample;
use crate::records::History;

/// One symbol in the latest round, with its change versus its own previous reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub symbol: String,
    pub value: f64,
    /// Percent change; `None` means no prior reading and must not be read as zero.
    pub change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub rows: Vec<SnapshotRow>,
}

impl Snapshot {
    pub fn get(&self, symbol: &str) -> Option<&SnapshotRow> {
        self.rows.iter().find(|row| row.symbol == symbol)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows sharing the most recent timestamp, one per symbol, change left unset.
pub fn build_snapshot(history: &History) -> Option<Snapshot> {
    let taken_at = history.latest_timestamp()?;
    let mut seen = HashSet::new();
    let rows = history
        .samples
        .iter()
        .filter(|sample| sample.sampled_at == taken_at)
        .filter(|sample| seen.insert(sample.symbol.as_str()))
        .map(|sample| SnapshotRow {
            symbol: sample.symbol.clone(),
            value: sample.value,
            change: None,
        })
        .collect();

    Some(Snapshot { taken_at, rows })
}

/// Fill in each row's change against that symbol's latest reading strictly before the snapshot.
pub fn compute_change(history: &History, mut snapshot: Snapshot) -> Snapshot {
    let mut previous: HashMap<&str, &Sample> = HashMap::new();
    for sample in history
        .samples
        .iter()
        .filter(|sample| sample.sampled_at < snapshot.taken_at)
    {
        previous
            .entry(sample.symbol.as_str())
            .and_modify(|best| {
                if sample.sampled_at > best.sampled_at {
                    *best = sample;
                }
            })
            .or_insert(sample);
    }

    for row in &mut snapshot.rows {
        row.change = previous
            .get(row.symbol.as_str())
            .and_then(|prior| percent_change(prior.value, row.value));
    }

    snapshot
}

/// Latest snapshot with changes filled in, or `None` for an empty history.
pub fn latest_snapshot(history: &History) -> Option<Snapshot> {
    build_snapshot(history).map(|snapshot| compute_change(history, snapshot))
}

/// `(latest - previous) / previous * 100`; undefined for a zero baseline.
pub fn percent_change(previous: f64, latest: f64) -> Option<f64> {
    if previous.abs() < f64::EPSILON {
        None
    } else {
        Some((latest - previous) / previous * 100.0)
    }
}
