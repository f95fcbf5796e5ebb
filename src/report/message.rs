use chrono::{DateTime, Utc};

use crate::analysis::{Band, Classification, SnapshotRow};
use crate::utils::human_utc;

pub const ALERT_TITLE: &str = "RSI Alert";
const COLOR_GREEN: u32 = 0x00ff00;
const COLOR_GREY: u32 = 0x95a5a6;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertSection {
    pub heading: String,
    pub lines: Vec<String>,
}

/// Channel-agnostic alert body: band sections plus a footer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub title: String,
    pub color: u32,
    pub sections: Vec<AlertSection>,
    pub footer: String,
}

impl AlertMessage {
    pub fn has_signals(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Plain-text rendering used by the file sink and `--dry-run`.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n", self.title);
        if self.sections.is_empty() {
            out.push_str("\nNo symbols crossed a threshold.\n");
        }
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.heading);
            out.push('\n');
            for line in &section.lines {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out.push_str(&self.footer);
        out.push('\n');
        out
    }
}

fn heading(band: Band) -> &'static str {
    match band {
        Band::Overbought => "🚀 Take Long (Overbought)",
        Band::Oversold => "🔻 Take Short (Oversold)",
        Band::RisingMid => "📈 Rising RSI (Mid Band)",
        Band::FallingMid => "📉 Falling RSI (Mid Band)",
    }
}

fn format_line(band: Band, row: &SnapshotRow) -> String {
    match (band, row.change) {
        (Band::RisingMid | Band::FallingMid, Some(change)) => {
            format!("{} (Power: {:.2}, {:+.2}%)", row.symbol, row.value, change)
        }
        _ => format!("{} (Power: {:.2})", row.symbol, row.value),
    }
}

/// Build the alert for one classified snapshot. Empty bands are left out.
pub fn format_alert(classification: &Classification, taken_at: &DateTime<Utc>) -> AlertMessage {
    let sections: Vec<AlertSection> = Band::ALL
        .iter()
        .filter_map(|band| {
            let rows = classification.band(*band);
            if rows.is_empty() {
                return None;
            }
            Some(AlertSection {
                heading: heading(*band).to_string(),
                lines: rows.iter().map(|row| format_line(*band, row)).collect(),
            })
        })
        .collect();

    let color = if sections.is_empty() {
        COLOR_GREY
    } else {
        COLOR_GREEN
    };

    AlertMessage {
        title: ALERT_TITLE.to_string(),
        color,
        sections,
        footer: format!("Last Update: {}", human_utc(taken_at)),
    }
}
