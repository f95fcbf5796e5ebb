use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use tokio::sync::watch;

use rsi_sentinel::cli::{Cli, Commands};
use rsi_sentinel::config::Config;
use rsi_sentinel::error::{Context, Result};
use rsi_sentinel::records::HistoryStore;
use rsi_sentinel::report::{ReportOutcome, Reporter};
use rsi_sentinel::scheduler::{Ingestor, Scheduler};
use rsi_sentinel::ui::run_dashboard;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Failed to load configuration")?;
    let store = Arc::new(HistoryStore::from_config(&config));

    match cli.command {
        Commands::Run => run(&config, store).await?,
        Commands::Sample => sample(&config, store).await?,
        Commands::Report { dry_run } => report(&config, store, dry_run).await?,
        Commands::Dashboard => {
            let thresholds = config.thresholds;
            tokio::task::spawn_blocking(move || run_dashboard(&store, thresholds)).await??;
        }
    }

    Ok(())
}

async fn run(config: &Config, store: Arc<HistoryStore>) -> Result<()> {
    let ingestor = Ingestor::from_config(config, Arc::clone(&store))?;
    let reporter = Reporter::from_config(config, store)?;
    info!("Reports go to the {} sink", reporter.sink_name());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(err) => warn!("Failed to listen for Ctrl-C: {err}"),
        }
        let _ = shutdown_tx.send(true);
    });

    Scheduler::new(ingestor, reporter, config.schedule.clone())
        .run(shutdown_rx)
        .await
}

async fn sample(config: &Config, store: Arc<HistoryStore>) -> Result<()> {
    let ingestor = Ingestor::from_config(config, Arc::clone(&store))?;
    let outcome = ingestor.run_once().await?;
    println!(
        "Appended {} samples to {} ({} symbols failed)",
        outcome.persisted,
        store.path().display(),
        outcome.failed
    );
    Ok(())
}

async fn report(config: &Config, store: Arc<HistoryStore>, dry_run: bool) -> Result<()> {
    let reporter = Reporter::from_config(config, store)?;

    if dry_run {
        match reporter.prepare().await? {
            Some(prepared) => {
                print!("{}", prepared.message.to_text());
                println!(
                    "\nChart: {} ({} bytes)",
                    prepared.chart.filename,
                    prepared.chart.bytes.len()
                );
            }
            None => println!("No samples recorded yet."),
        }
        return Ok(());
    }

    match reporter.run_once().await? {
        ReportOutcome::NoData => println!("No samples recorded yet."),
        ReportOutcome::Delivered { signals } => {
            println!("Delivered report with {signals} signals via {}", reporter.sink_name())
        }
        ReportOutcome::DeliveryFailed(reason) => println!("Delivery failed: {reason}"),
    }
    Ok(())
}
