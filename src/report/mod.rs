use std::sync::Arc;

use log::{error, info};

use crate::analysis::{market_view, MarketView};
use crate::config::{Config, Thresholds};
use crate::error::Result;
use crate::records::HistoryStore;

pub mod chart;
pub mod message;
pub mod sink;

pub use chart::{ChartImage, ChartRenderer, SvgScatterRenderer};
pub use message::{format_alert, AlertMessage, AlertSection};
pub use sink::{DirectorySink, DiscordWebhookSink, NotificationSink};

/// Everything one reporting tick produces before delivery.
#[derive(Debug, Clone)]
pub struct PreparedReport {
    pub view: MarketView,
    pub message: AlertMessage,
    pub chart: ChartImage,
}

/// How a reporting tick ended. Each case is logged differently.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    NoData,
    Delivered { signals: usize },
    DeliveryFailed(String),
}

/// Load history, classify the latest snapshot, render, and hand off to a sink.
pub struct Reporter {
    store: Arc<HistoryStore>,
    thresholds: Thresholds,
    renderer: Box<dyn ChartRenderer>,
    sink: Arc<dyn NotificationSink>,
}

impl Reporter {
    pub fn new(
        store: Arc<HistoryStore>,
        thresholds: Thresholds,
        renderer: Box<dyn ChartRenderer>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            thresholds,
            renderer,
            sink,
        }
    }

    /// Discord when a webhook is configured, otherwise the report directory.
    pub fn from_config(config: &Config, store: Arc<HistoryStore>) -> Result<Self> {
        let sink: Arc<dyn NotificationSink> = match config.notify.discord_webhook.as_deref() {
            Some(url) => Arc::new(DiscordWebhookSink::new(url)?),
            None => Arc::new(DirectorySink::new(config.notify.output_dir.clone())),
        };
        Ok(Self::new(
            store,
            config.thresholds,
            Box::new(SvgScatterRenderer::new(config.thresholds)),
            sink,
        ))
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Build the report without delivering it; `None` when no samples exist yet.
    pub async fn prepare(&self) -> Result<Option<PreparedReport>> {
        let store = Arc::clone(&self.store);
        let (history, load) = tokio::task::spawn_blocking(move || store.load()).await??;
        info!(
            "Loaded {} history rows ({} dropped, {} duplicates)",
            history.len(),
            load.rows_dropped,
            load.duplicates
        );

        let Some(view) = market_view(&history, &self.thresholds) else {
            return Ok(None);
        };

        let message = format_alert(&view.classification, &view.snapshot.taken_at);
        let chart = self.renderer.render(
            &view.snapshot.rows,
            &view.classification.highlighted_symbols(),
        )?;

        Ok(Some(PreparedReport {
            view,
            message,
            chart,
        }))
    }

    /// One reporting pass. Sink failures are logged and reported, never raised.
    pub async fn run_once(&self) -> Result<ReportOutcome> {
        let Some(report) = self.prepare().await? else {
            info!("No samples recorded yet; skipping report");
            return Ok(ReportOutcome::NoData);
        };

        let signals: usize = report
            .message
            .sections
            .iter()
            .map(|section| section.lines.len())
            .sum();
        if signals == 0 {
            info!(
                "Snapshot at {} has no symbols past any threshold",
                report.view.snapshot.taken_at
            );
        }

        match self.sink.deliver(&report.message, &report.chart).await {
            Ok(()) => {
                info!(
                    "Report with {signals} signals delivered via {}",
                    self.sink.name()
                );
                Ok(ReportOutcome::Delivered { signals })
            }
            Err(err) => {
                error!("Delivering report via {} failed: {err:#}", self.sink.name());
                Ok(ReportOutcome::DeliveryFailed(err.to_string()))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::fetch::{Sample, SamplingRound};
    use chrono::{TimeZone, Utc};

    fn reporter(store: Arc<HistoryStore>, sink: Arc<RecordingSink>) -> Reporter {
        let thresholds = Thresholds::default();
        Reporter::new(
            store,
            thresholds,
            Box::new(SvgScatterRenderer::new(thresholds)),
            sink,
        )
    }

    fn seed(store: &HistoryStore, values: &[(&str, f64)]) {
        let stamp = Utc.with_ymd_and_hms(2024, 8, 14, 10, 0, 0).unwrap();
        let mut round = SamplingRound::new(stamp);
        for (symbol, value) in values {
            round.samples.push(Sample {
                symbol: symbol.to_string(),
                value: *value,
                sampled_at: stamp,
            });
        }
        store.append(&round).unwrap();
    }

    #[tokio::test]
    async fn empty_history_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI"));
        let sink = Arc::new(RecordingSink::default());

        let outcome = reporter(store, Arc::clone(&sink)).run_once().await.unwrap();

        assert_eq!(outcome, ReportOutcome::NoData);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivers_classified_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI"));
        seed(&store, &[("A", 72.0), ("B", 28.0), ("C", 50.0)]);
        let sink = Arc::new(RecordingSink::default());

        let outcome = reporter(store, Arc::clone(&sink)).run_once().await.unwrap();

        assert_eq!(outcome, ReportOutcome::Delivered { signals: 2 });
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered[0].sections[0].lines[0], "A (Power: 72.00)");
    }

    #[tokio::test]
    async fn sink_failure_does_not_fail_the_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path().join("rsi.csv"), "15m RSI"));
        seed(&store, &[("A", 72.0)]);
        let sink = Arc::new(RecordingSink::failing());

        let outcome = reporter(store, Arc::clone(&sink)).run_once().await.unwrap();
        assert!(matches!(outcome, ReportOutcome::DeliveryFailed(_)));
        assert_eq!(sink.attempts(), 1);
    }
}
