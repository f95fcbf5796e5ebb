use std::collections::HashSet;
use std::fmt::Write as _;

use crate::analysis::SnapshotRow;
use crate::config::Thresholds;
use crate::error::Result;
use crate::utils::escape_xml;

/// Rendered chart ready to attach to a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stateless renderer from snapshot rows to an image.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, rows: &[SnapshotRow], highlighted: &[String]) -> Result<ChartImage>;
}

/// Scatter of every symbol's reading with dashed reference lines at the extremes.
pub struct SvgScatterRenderer {
    thresholds: Thresholds,
    width: u32,
    height: u32,
}

const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 32.0;

impl SvgScatterRenderer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            width: 1200,
            height: 520,
        }
    }

    fn plot_height(&self) -> f64 {
        self.height as f64 - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn y_for(&self, value: f64) -> f64 {
        MARGIN_TOP + (1.0 - value.clamp(0.0, 100.0) / 100.0) * self.plot_height()
    }

    fn x_for(&self, idx: usize, count: usize) -> f64 {
        let plot_width = self.width as f64 - MARGIN_LEFT - MARGIN_RIGHT;
        if count <= 1 {
            MARGIN_LEFT + plot_width / 2.0
        } else {
            MARGIN_LEFT + plot_width * idx as f64 / (count - 1) as f64
        }
    }

    fn reference_line(&self, svg: &mut String, value: f64, color: &str, label: &str) {
        let y = self.y_for(value);
        let _ = write!(
            svg,
            r#"<line x1="{x1:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="{color}" stroke-dasharray="6 4"/><text x="{tx:.1}" y="{ty:.1}" fill="{color}" font-size="12" text-anchor="end">{label}</text>"#,
            x1 = MARGIN_LEFT,
            x2 = self.width as f64 - MARGIN_RIGHT,
            tx = self.width as f64 - MARGIN_RIGHT,
            ty = y - 4.0,
            label = escape_xml(label),
        );
    }
}

/// Red-yellow-green ramp over 0..=100, low readings red.
pub fn ramp_color(value: f64) -> String {
    let t = value.clamp(0.0, 100.0) / 100.0;
    let (r, g) = if t < 0.5 {
        (215.0, 48.0 + (255.0 - 48.0) * (t / 0.5))
    } else {
        (215.0 - (215.0 - 26.0) * ((t - 0.5) / 0.5), 255.0 - (255.0 - 152.0) * ((t - 0.5) / 0.5))
    };
    format!("#{:02x}{:02x}{:02x}", r.round() as u8, g.round() as u8, 80)
}

impl ChartRenderer for SvgScatterRenderer {
    fn render(&self, rows: &[SnapshotRow], highlighted: &[String]) -> Result<ChartImage> {
        let highlighted: HashSet<&str> = highlighted.iter().map(String::as_str).collect();
        let mut svg = String::new();

        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif"><rect width="100%" height="100%" fill="#ffffff"/><text x="{cx}" y="28" font-size="18" text-anchor="middle">RSI Distribution for Selected Symbols</text>"##,
            w = self.width,
            h = self.height,
            cx = self.width / 2,
        );

        for tick in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let y = self.y_for(tick);
            let _ = write!(
                svg,
                r##"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#eeeeee"/><text x="{tx}" y="{ty:.1}" font-size="11" text-anchor="end">{tick}</text>"##,
                x1 = MARGIN_LEFT,
                x2 = self.width as f64 - MARGIN_RIGHT,
                tx = MARGIN_LEFT - 6.0,
                ty = y + 4.0,
            );
        }

        self.reference_line(
            &mut svg,
            self.thresholds.overbought,
            "#d62728",
            &format!("Overbought ({})", self.thresholds.overbought),
        );
        self.reference_line(
            &mut svg,
            self.thresholds.oversold,
            "#2ca02c",
            &format!("Oversold ({})", self.thresholds.oversold),
        );

        for (idx, row) in rows.iter().enumerate() {
            let x = self.x_for(idx, rows.len());
            let y = self.y_for(row.value);
            let is_highlighted = highlighted.contains(row.symbol.as_str());
            let radius = if is_highlighted { 6.0 } else { 4.0 };
            let _ = write!(
                svg,
                r##"<circle cx="{x:.1}" cy="{y:.1}" r="{radius}" fill="{fill}" stroke="#333333" stroke-width="0.5"><title>{symbol}: {value:.2}</title></circle>"##,
                fill = ramp_color(row.value),
                symbol = escape_xml(&row.symbol),
                value = row.value,
            );
            if is_highlighted {
                let _ = write!(
                    svg,
                    r#"<text x="{x:.1}" y="{ty:.1}" font-size="11" text-anchor="middle">{symbol}</text>"#,
                    ty = y - 10.0,
                    symbol = escape_xml(&row.symbol),
                );
            }
        }

        svg.push_str("</svg>");

        Ok(ChartImage {
            filename: "rsi_scatter.svg".to_string(),
            content_type: "image/svg+xml".to_string(),
            bytes: svg.into_bytes(),
        })
    }
}
