use std::cmp::Ordering;

use crate::config::Thresholds;

use super::{Snapshot, SnapshotRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Overbought,
    Oversold,
    RisingMid,
    FallingMid,
}

impl Band {
    pub const ALL: [Band; 4] = [
        Band::Overbought,
        Band::Oversold,
        Band::RisingMid,
        Band::FallingMid,
    ];

    pub fn title(self, thresholds: &Thresholds) -> String {
        match self {
            Band::Overbought => format!("Overbought (RSI > {})", thresholds.overbought),
            Band::Oversold => format!("Oversold (RSI < {})", thresholds.oversold),
            Band::RisingMid => format!(
                "Rising RSI ({}-{})",
                thresholds.neutral_low, thresholds.neutral_high
            ),
            Band::FallingMid => format!(
                "Falling RSI ({}-{})",
                thresholds.neutral_low, thresholds.neutral_high
            ),
        }
    }
}

/// Snapshot rows partitioned into bands, each ordered most extreme first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub overbought: Vec<SnapshotRow>,
    pub oversold: Vec<SnapshotRow>,
    pub rising_mid: Vec<SnapshotRow>,
    pub falling_mid: Vec<SnapshotRow>,
}

impl Classification {
    pub fn band(&self, band: Band) -> &[SnapshotRow] {
        match band {
            Band::Overbought => &self.overbought,
            Band::Oversold => &self.oversold,
            Band::RisingMid => &self.rising_mid,
            Band::FallingMid => &self.falling_mid,
        }
    }

    pub fn is_empty(&self) -> bool {
        Band::ALL.iter().all(|band| self.band(*band).is_empty())
    }

    /// Symbols worth calling out on the chart: both extremes.
    pub fn highlighted_symbols(&self) -> Vec<String> {
        self.overbought
            .iter()
            .chain(&self.oversold)
            .map(|row| row.symbol.clone())
            .collect()
    }
}

/// First matching band for a single row, or `None` when it is unclassified.
pub fn band_for(row: &SnapshotRow, thresholds: &Thresholds) -> Option<Band> {
    if row.value > thresholds.overbought {
        return Some(Band::Overbought);
    }
    if row.value < thresholds.oversold {
        return Some(Band::Oversold);
    }
    if (thresholds.neutral_low..=thresholds.neutral_high).contains(&row.value) {
        return match row.change {
            Some(change) if change > 0.0 => Some(Band::RisingMid),
            Some(change) if change < 0.0 => Some(Band::FallingMid),
            _ => None,
        };
    }
    None
}

/// Pure partition of the snapshot; no I/O.
pub fn classify(snapshot: &Snapshot, thresholds: &Thresholds) -> Classification {
    let mut result = Classification::default();

    for row in &snapshot.rows {
        match band_for(row, thresholds) {
            Some(Band::Overbought) => result.overbought.push(row.clone()),
            Some(Band::Oversold) => result.oversold.push(row.clone()),
            Some(Band::RisingMid) => result.rising_mid.push(row.clone()),
            Some(Band::FallingMid) => result.falling_mid.push(row.clone()),
            None => {}
        }
    }

    result
        .overbought
        .sort_by(|a, b| cmp_f64(b.value, a.value).then_with(|| a.symbol.cmp(&b.symbol)));
    result
        .oversold
        .sort_by(|a, b| cmp_f64(a.value, b.value).then_with(|| a.symbol.cmp(&b.symbol)));
    result.rising_mid.sort_by(|a, b| {
        cmp_f64(b.change.unwrap_or(0.0), a.change.unwrap_or(0.0))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    result.falling_mid.sort_by(|a, b| {
        cmp_f64(a.change.unwrap_or(0.0), b.change.unwrap_or(0.0))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    result
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(symbol: &str, value: f64, change: Option<f64>) -> SnapshotRow {
        SnapshotRow {
            symbol: symbol.to_string(),
            value,
            change,
        }
    }

    fn snapshot(rows: Vec<SnapshotRow>) -> Snapshot {
        Snapshot {
            taken_at: Utc::now(),
            rows,
        }
    }

    fn symbols(rows: &[SnapshotRow]) -> Vec<&str> {
        rows.iter().map(|row| row.symbol.as_str()).collect()
    }

    #[test]
    fn extremes_are_ordered_most_extreme_first() {
        let snap = snapshot(vec![
            row("A", 72.0, None),
            row("B", 28.0, None),
            row("C", 50.0, None),
            row("D", 88.0, Some(1.0)),
            row("E", 12.0, None),
        ]);

        let bands = classify(&snap, &Thresholds::default());
        assert_eq!(symbols(&bands.overbought), vec!["D", "A"]);
        assert_eq!(symbols(&bands.oversold), vec!["E", "B"]);
        assert!(bands.rising_mid.is_empty());
        assert!(bands.falling_mid.is_empty());
    }

    #[test]
    fn mid_band_splits_on_change_sign() {
        let snap = snapshot(vec![
            row("UP1", 46.0, Some(2.0)),
            row("UP2", 54.0, Some(9.5)),
            row("DOWN1", 45.0, Some(-1.0)),
            row("DOWN2", 55.0, Some(-7.0)),
            row("FLAT", 50.0, Some(0.0)),
            row("UNKNOWN", 50.0, None),
        ]);

        let bands = classify(&snap, &Thresholds::default());
        assert_eq!(symbols(&bands.rising_mid), vec!["UP2", "UP1"]);
        assert_eq!(symbols(&bands.falling_mid), vec!["DOWN2", "DOWN1"]);
    }

    #[test]
    fn boundaries_are_exclusive_for_extremes() {
        let thresholds = Thresholds::default();
        assert_eq!(band_for(&row("X", 70.0, Some(5.0)), &thresholds), None);
        assert_eq!(band_for(&row("X", 30.0, Some(5.0)), &thresholds), None);
        assert_eq!(band_for(&row("X", 60.0, Some(5.0)), &thresholds), None);
        assert_eq!(
            band_for(&row("X", 70.01, None), &thresholds),
            Some(Band::Overbought)
        );
    }

    #[test]
    fn every_row_lands_in_at_most_one_band() {
        let rows: Vec<SnapshotRow> = (0..=100)
            .map(|v| {
                let change = if v % 2 == 0 { Some(1.0) } else { Some(-1.0) };
                row(&format!("S{v}"), v as f64, change)
            })
            .collect();
        let thresholds = Thresholds::default();
        let bands = classify(&snapshot(rows.clone()), &thresholds);

        let total: usize = Band::ALL.iter().map(|b| bands.band(*b).len()).sum();
        let classifiable = rows
            .iter()
            .filter(|r| band_for(r, &thresholds).is_some())
            .count();
        assert_eq!(total, classifiable);

        for window in bands.overbought.windows(2) {
            assert!(window[0].value > window[1].value);
        }
        for window in bands.oversold.windows(2) {
            assert!(window[0].value < window[1].value);
        }
    }

    #[test]
    fn highlights_both_extremes() {
        let snap = snapshot(vec![row("A", 72.0, None), row("B", 28.0, None)]);
        let bands = classify(&snap, &Thresholds::default());
        assert_eq!(bands.highlighted_symbols(), vec!["A", "B"]);
        assert!(!bands.is_empty());
    }
}
