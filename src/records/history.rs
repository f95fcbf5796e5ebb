use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use log::warn;

use crate::error::{Context, Result};
use crate::fetch::{Sample, SamplingRound};

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Every persisted sample, ordered by timestamp (file order within a round).
#[derive(Debug, Clone, Default)]
pub struct History {
    pub samples: Vec<Sample>,
}

impl History {
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|sample| sample.sampled_at);
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.iter().map(|sample| sample.sampled_at).max()
    }
}

/// Row accounting for one history load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub duplicates: usize,
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accept RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]+00:00` and naive (UTC) layouts.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Oscillator readings live in `0..=100`; anything else is a coercion failure.
fn parse_value(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| (0.0..=100.0).contains(value))
}

/// Split off a trailing record that has no terminating newline yet.
///
/// Appends always end in `\n`, so an unterminated tail is a write still in
/// progress, possibly from another process.
fn complete_records(bytes: &[u8]) -> (&[u8], bool) {
    match bytes.iter().rposition(|byte| *byte == b'\n') {
        Some(last) if last + 1 == bytes.len() => (bytes, false),
        Some(last) => (&bytes[..=last], true),
        None => (&bytes[..0], !bytes.is_empty()),
    }
}

/// Serialize a round into one CSV buffer so it can be appended with a single write.
pub fn encode_round(round: &SamplingRound, value_column: &str, with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if with_header {
        writer.write_record([SYMBOL_COLUMN, TIMESTAMP_COLUMN, value_column])?;
    }

    let stamp = format_timestamp(&round.sampled_at);
    for sample in &round.samples {
        let value = sample.value.to_string();
        writer.write_record([sample.symbol.as_str(), stamp.as_str(), value.as_str()])?;
    }

    Ok(writer.into_inner().map_err(|err| err.into_error())?)
}

/// Parse history rows, dropping any that fail coercion instead of failing the load.
///
/// An unterminated final record is skipped and counted as dropped.
pub fn decode_history<R: Read>(mut reader: R, value_column: &str) -> Result<(History, LoadReport)> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .context("Failed to read history")?;
    let (complete, torn_tail) = complete_records(&bytes);

    let mut report = LoadReport::default();
    if torn_tail {
        warn!("Ignoring unterminated trailing history record");
        report.rows_read += 1;
        report.rows_dropped += 1;
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(complete);

    let headers = reader.headers().context("Failed to read history header")?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let symbol_idx = position(SYMBOL_COLUMN).unwrap_or(0);
    let timestamp_idx = position(TIMESTAMP_COLUMN).unwrap_or(1);
    let value_idx = position(value_column)
        .or_else(|| headers.iter().position(|h| h.trim().ends_with("RSI")))
        .unwrap_or(2);

    let mut seen = HashSet::new();
    let mut samples = Vec::new();

    for (line, result) in reader.records().enumerate() {
        report.rows_read += 1;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("Dropping unreadable history row {}: {}", line + 2, err);
                report.rows_dropped += 1;
                continue;
            }
        };

        let symbol = record.get(symbol_idx).map(str::trim).unwrap_or_default();
        let sampled_at = record.get(timestamp_idx).and_then(parse_timestamp);
        let value = record.get(value_idx).and_then(parse_value);

        let (Some(sampled_at), Some(value)) = (sampled_at, value) else {
            report.rows_dropped += 1;
            continue;
        };
        if symbol.is_empty() {
            report.rows_dropped += 1;
            continue;
        }

        if !seen.insert((symbol.to_string(), sampled_at)) {
            report.duplicates += 1;
            continue;
        }

        samples.push(Sample {
            symbol: symbol.to_string(),
            value,
            sampled_at,
        });
    }

    if report.rows_dropped > 0 {
        warn!(
            "Dropped {} of {} history rows that failed coercion",
            report.rows_dropped, report.rows_read
        );
    }

    Ok((History::new(samples), report))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMN: &str = "15m RSI";

    #[test]
    fn parses_supported_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 8, 14, 10, 3, 0).unwrap();

        assert_eq!(parse_timestamp("2024-08-14T10:03:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-08-14 10:03:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-08-14 12:03:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-08-14 10:03:00"), Some(expected));
        assert!(parse_timestamp("2024-08-14 10:03:00.250000+00:00").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn drops_rows_that_fail_coercion() {
        let csv = "Symbol,Timestamp,15m RSI\n\
                   BTCUSDT.P,2024-08-14T10:03:00Z,55.5\n\
                   ETHUSDT.P,not-a-date,40\n\
                   SOLUSDT.P,2024-08-14T10:03:00Z,\n\
                   XRPUSDT.P,2024-08-14T10:03:00Z,NaN\n\
                   ADAUSDT.P,2024-08-14T10:03:00Z,31.2\n";

        let (history, report) = decode_history(csv.as_bytes(), COLUMN).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_dropped, 3);
    }

    #[test]
    fn drops_readings_outside_oscillator_range() {
        let csv = "Symbol,Timestamp,15m RSI\n\
                   BTCUSDT.P,2024-08-14T10:03:00Z,120\n\
                   ETHUSDT.P,2024-08-14T10:03:00Z,-5\n\
                   SOLUSDT.P,2024-08-14T10:03:00Z,100\n\
                   ADAUSDT.P,2024-08-14T10:03:00Z,0\n";

        let (history, report) = decode_history(csv.as_bytes(), COLUMN).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(report.rows_dropped, 2);
    }

    #[test]
    fn skips_unterminated_trailing_record() {
        let csv = "Symbol,Timestamp,15m RSI\n\
                   BTCUSDT.P,2024-08-14T10:03:00Z,55.25\n\
                   ETHUSDT.P,2024-08-14T10:03:00Z,55.2";

        let (history, report) = decode_history(csv.as_bytes(), COLUMN).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history.samples[0].symbol, "BTCUSDT.P");
        assert_eq!(report.rows_dropped, 1);
    }

    #[test]
    fn collapses_duplicate_rows() {
        let csv = "Symbol,Timestamp,15m RSI\n\
                   BTCUSDT.P,2024-08-14T10:03:00Z,55.5\n\
                   BTCUSDT.P,2024-08-14T10:03:00Z,55.5\n";

        let (history, report) = decode_history(csv.as_bytes(), COLUMN).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn encodes_shared_round_timestamp() {
        let stamp = Utc.with_ymd_and_hms(2024, 8, 14, 10, 3, 0).unwrap();
        let mut round = SamplingRound::new(stamp);
        for (symbol, value) in [("A", 72.0), ("B", 28.5)] {
            round.samples.push(Sample {
                symbol: symbol.to_string(),
                value,
                sampled_at: stamp,
            });
        }

        let bytes = encode_round(&round, COLUMN, true).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(
            text,
            "Symbol,Timestamp,15m RSI\n\
             A,2024-08-14T10:03:00.000000Z,72\n\
             B,2024-08-14T10:03:00.000000Z,28.5\n"
        );
    }
}
