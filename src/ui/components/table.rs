use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Row, Table},
};

use crate::analysis::{Band, SnapshotRow};

pub fn build_table<'a>(
    rows: Vec<Row<'a>>,
    header: Row<'a>,
    widths: Vec<Constraint>,
    title: impl Into<String>,
) -> Table<'a> {
    Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title.into()))
        .column_spacing(2)
}

/// Header cells for a band table; mid bands carry a change column.
pub fn band_header(band: Band) -> Row<'static> {
    let mut labels = vec!["Symbol", "RSI"];
    if matches!(band, Band::RisingMid | Band::FallingMid) {
        labels.push("Change");
    }
    Row::new(
        labels
            .into_iter()
            .map(|label| Cell::from(label).style(Style::default().fg(Color::Yellow))),
    )
}

pub fn band_widths(band: Band) -> Vec<Constraint> {
    match band {
        Band::RisingMid | Band::FallingMid => vec![
            Constraint::Min(14),
            Constraint::Length(7),
            Constraint::Length(9),
        ],
        Band::Overbought | Band::Oversold => vec![Constraint::Min(14), Constraint::Length(7)],
    }
}

pub fn band_row(band: Band, row: &SnapshotRow) -> Row<'static> {
    let mut cells = vec![
        Cell::from(row.symbol.clone()),
        Cell::from(format!("{:.2}", row.value)),
    ];
    if matches!(band, Band::RisingMid | Band::FallingMid) {
        let change = row
            .change
            .map(|pct| format!("{pct:+.2}%"))
            .unwrap_or_else(|| "-".to_string());
        let color = match row.change {
            Some(pct) if pct > 0.0 => Color::Green,
            Some(pct) if pct < 0.0 => Color::Red,
            _ => Color::Reset,
        };
        cells.push(Cell::from(change).style(Style::default().fg(color)));
    }
    Row::new(cells)
}
