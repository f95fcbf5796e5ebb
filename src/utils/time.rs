use chrono::{DateTime, Utc};

/// `2024-08-14 10:03:00 UTC`, used in footers and the dashboard header.
pub fn human_utc(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Filesystem-friendly stamp for report artifacts.
pub fn report_timestamp_slug(ts: &DateTime<Utc>) -> String {
    ts.format("%Y_%m_%d_%H_%M_%S").to_string()
}
