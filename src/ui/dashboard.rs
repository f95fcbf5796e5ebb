use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use log::warn;
use ratatui::{prelude::*, widgets::Paragraph};

use crate::analysis::{market_view, Band, MarketView};
use crate::config::Thresholds;
use crate::error::Result;
use crate::records::{HistoryStore, LoadReport};
use crate::utils::human_utc;

use super::components::utils::{quadrants, split_vertical};
use super::components::{band_header, band_row, band_widths, build_table, TerminalGuard};
use super::styles::{error_line, header_text, secondary_line};

pub const AUTO_REFRESH: Duration = Duration::from_secs(30);

/// What the dashboard shows between refreshes.
pub struct DashboardState {
    thresholds: Thresholds,
    view: Option<MarketView>,
    load: LoadReport,
    refreshed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl DashboardState {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            view: None,
            load: LoadReport::default(),
            refreshed_at: None,
            error: None,
        }
    }

    /// Reload history. A failed load keeps the previous view on screen.
    pub fn refresh(&mut self, store: &HistoryStore) {
        match store.load() {
            Ok((history, load)) => {
                self.view = market_view(&history, &self.thresholds);
                self.load = load;
                self.error = None;
            }
            Err(err) => {
                warn!("Dashboard refresh failed: {err}");
                self.error = Some(err.to_string());
            }
        }
        self.refreshed_at = Some(Utc::now());
    }

    pub fn view(&self) -> Option<&MarketView> {
        self.view.as_ref()
    }
}

fn status_lines(state: &DashboardState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match &state.view {
        Some(view) => lines.push(secondary_line(format!(
            "Last Update: {} | {} symbols | {} rows dropped",
            human_utc(&view.snapshot.taken_at),
            view.snapshot.len(),
            state.load.rows_dropped
        ))),
        None => lines.push(secondary_line("No samples recorded yet")),
    }
    if let Some(err) = &state.error {
        lines.push(error_line(format!("Refresh failed: {err}")));
    }
    lines
}

pub fn draw_dashboard(frame: &mut Frame, state: &DashboardState) {
    let chunks = split_vertical(
        frame.size(),
        &[
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(1),
        ],
    );

    let mut header = header_text("RSI Sentinel");
    header.extend(status_lines(state));
    frame.render_widget(Paragraph::new(header), chunks[0]);

    for (band, area) in Band::ALL.into_iter().zip(quadrants(chunks[1])) {
        let rows = state
            .view
            .as_ref()
            .map(|view| view.classification.band(band))
            .unwrap_or(&[]);
        let table = build_table(
            rows.iter().map(|row| band_row(band, row)).collect(),
            band_header(band),
            band_widths(band),
            format!("{} [{}]", band.title(&state.thresholds), rows.len()),
        );
        frame.render_widget(table, area);
    }

    let refreshed = state
        .refreshed_at
        .map(|ts| human_utc(&ts))
        .unwrap_or_else(|| "never".to_string());
    frame.render_widget(
        Paragraph::new(secondary_line(format!(
            "r refresh | q/Esc quit | auto-refresh every {}s | refreshed {refreshed}",
            AUTO_REFRESH.as_secs()
        ))),
        chunks[2],
    );
}

/// Blocking terminal loop; run it off the async runtime.
pub fn run_dashboard(store: &HistoryStore, thresholds: Thresholds) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut state = DashboardState::new(thresholds);
    state.refresh(store);
    let mut last_refresh = Instant::now();

    loop {
        guard.terminal_mut().draw(|f| draw_dashboard(f, &state))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(k) = event::read()? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Char('r') => {
                        state.refresh(store);
                        last_refresh = Instant::now();
                    }
                    _ => {}
                }
            }
        }

        if last_refresh.elapsed() >= AUTO_REFRESH {
            state.refresh(store);
            last_refresh = Instant::now();
        }
    }

    guard.restore()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Sample, SamplingRound};
    use chrono::TimeZone;
    use ratatui::backend::TestBackend;

    fn render(state: &DashboardState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw_dashboard(f, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn empty_store_renders_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI");
        let mut state = DashboardState::new(Thresholds::default());
        state.refresh(&store);

        assert!(state.view().is_none());
        assert!(render(&state).contains("No samples recorded yet"));
    }

    #[test]
    fn refreshed_view_lists_band_members() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI");
        let stamp = Utc.with_ymd_and_hms(2024, 8, 14, 10, 0, 0).unwrap();
        let mut round = SamplingRound::new(stamp);
        for (symbol, value) in [("AUSDT.P", 72.0), ("BUSDT.P", 28.0)] {
            round.samples.push(Sample {
                symbol: symbol.to_string(),
                value,
                sampled_at: stamp,
            });
        }
        store.append(&round).unwrap();

        let mut state = DashboardState::new(Thresholds::default());
        state.refresh(&store);
        let screen = render(&state);

        assert!(screen.contains("Last Update: 2024-08-14 10:00:00 UTC"));
        assert!(screen.contains("AUSDT.P"));
        assert!(screen.contains("BUSDT.P"));
        assert!(screen.contains("Overbought (RSI > 70) [1]"));
    }
}
