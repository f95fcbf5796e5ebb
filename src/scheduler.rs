use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::{load_universe, Config, ScheduleConfig};
use crate::error::{AppError, Result};
use crate::fetch::{FetchContext, RoundExecutor};
use crate::records::HistoryStore;
use crate::report::{ReportOutcome, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub persisted: usize,
    pub failed: usize,
}

/// One ingestion tick: sample the universe, then append the round.
pub struct Ingestor {
    executor: RoundExecutor,
    store: Arc<HistoryStore>,
    symbols: Arc<Vec<String>>,
}

impl Ingestor {
    pub fn new(executor: RoundExecutor, store: Arc<HistoryStore>, symbols: Vec<String>) -> Self {
        Self {
            executor,
            store,
            symbols: Arc::new(symbols),
        }
    }

    /// Load the universe and build the shared fetch context once.
    pub fn from_config(config: &Config, store: Arc<HistoryStore>) -> Result<Self> {
        let symbols = load_universe(&config.universe_file)?;
        let context = Arc::new(FetchContext::from_config(config)?);
        let executor = RoundExecutor::from_config(context, &config.fetch);
        Ok(Self::new(executor, store, symbols))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub async fn run_once(&self) -> Result<IngestOutcome> {
        self.run_at(Utc::now()).await
    }

    /// Run a round stamped `sampled_at`. A round where every symbol failed is an error.
    pub async fn run_at(&self, sampled_at: DateTime<Utc>) -> Result<IngestOutcome> {
        let round = self.executor.run_round(&self.symbols, sampled_at).await;
        let failed = round.failures.len();

        if round.is_empty() && !self.symbols.is_empty() {
            return Err(AppError::message(format!(
                "Round at {} failed for all {} symbols",
                sampled_at.to_rfc3339(),
                failed
            )));
        }

        let store = Arc::clone(&self.store);
        let persisted = tokio::task::spawn_blocking(move || store.append(&round)).await??;

        Ok(IngestOutcome { persisted, failed })
    }
}

/// Drives the ingestion and reporting loops until shutdown is signalled.
pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    reporter: Arc<Reporter>,
    schedule: ScheduleConfig,
}

impl Scheduler {
    pub fn new(ingestor: Ingestor, reporter: Reporter, schedule: ScheduleConfig) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            reporter: Arc::new(reporter),
            schedule,
        }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Scheduler started: {} symbols, ingest every {:?}, report every {:?}",
            self.ingestor.symbols().len(),
            self.schedule.ingest_every(),
            self.schedule.report_every()
        );

        let ingestion = tokio::spawn(ingestion_loop(
            Arc::clone(&self.ingestor),
            self.schedule.ingest_every(),
            self.schedule.ingest_backoff(),
            shutdown.clone(),
        ));
        let reporting = tokio::spawn(reporting_loop(
            Arc::clone(&self.reporter),
            self.schedule.report_every(),
            shutdown,
        ));

        let (ingestion, reporting) = tokio::join!(ingestion, reporting);
        ingestion?;
        reporting?;
        info!("Scheduler stopped");
        Ok(())
    }
}

/// Runs the ingestion tick on a fixed cadence; a failed tick waits `backoff` before retrying.
pub async fn ingestion_loop(
    ingestor: Arc<Ingestor>,
    every: Duration,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let tick = {
            let ingestor = Arc::clone(&ingestor);
            async move {
                let outcome = ingestor.run_once().await?;
                info!(
                    "Ingestion tick persisted {} samples ({} failed)",
                    outcome.persisted, outcome.failed
                );
                Ok(())
            }
        };

        if !guarded_tick("ingestion", tick).await {
            warn!("Backing off ingestion for {:?}", backoff);
            tokio::select! {
                _ = sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
            ticker.reset_immediately();
        }
    }
}

/// Runs the reporting tick on a fixed cadence, independent of ingestion.
pub async fn reporting_loop(
    reporter: Arc<Reporter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let tick = {
            let reporter = Arc::clone(&reporter);
            async move {
                if let ReportOutcome::DeliveryFailed(reason) = reporter.run_once().await? {
                    warn!("Report not delivered this tick: {reason}");
                }
                Ok(())
            }
        };
        guarded_tick("reporting", tick).await;
    }
}

/// Run a tick body in its own task so errors and panics end up in the log.
pub async fn guarded_tick<F>(name: &str, tick: F) -> bool
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(tick).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!("{name} tick failed: {err}");
            false
        }
        Err(join_err) => {
            error!("{name} tick aborted: {join_err}");
            false
        }
    }
}
