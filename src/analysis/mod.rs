use crate::config::Thresholds;
use crate::records::History;

pub mod bands;
pub mod snapshot;

pub use bands::{band_for, classify, Band, Classification};
pub use snapshot::{
    build_snapshot, compute_change, latest_snapshot, percent_change, Snapshot, SnapshotRow,
};

/// Latest snapshot plus its classification; what reports and the dashboard read.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketView {
    pub snapshot: Snapshot,
    pub classification: Classification,
}

pub fn market_view(history: &History, thresholds: &Thresholds) -> Option<MarketView> {
    let snapshot = latest_snapshot(history)?;
    let classification = classify(&snapshot, thresholds);
    Some(MarketView {
        snapshot,
        classification,
    })
}
