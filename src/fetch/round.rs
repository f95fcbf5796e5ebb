use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{info, warn};

use crate::config::FetchConfig;
use crate::error::{FetchError, FetchFailure};

use super::{ensure_concurrency_limit, FetchContext, Sample, SamplingRound};

/// Fans a round of fetches out over the symbol universe.
pub struct RoundExecutor {
    context: Arc<FetchContext>,
    concurrency_limit: usize,
    fetch_timeout: Duration,
}

impl RoundExecutor {
    pub fn new(context: Arc<FetchContext>, concurrency_limit: usize, fetch_timeout: Duration) -> Self {
        Self {
            context,
            concurrency_limit: ensure_concurrency_limit(concurrency_limit),
            fetch_timeout,
        }
    }

    pub fn from_config(context: Arc<FetchContext>, config: &FetchConfig) -> Self {
        Self::new(context, config.concurrency, config.timeout())
    }

    pub fn context(&self) -> &Arc<FetchContext> {
        &self.context
    }

    /// Fetch every symbol and wait for all of them to settle.
    ///
    /// Every sample is stamped with `sampled_at`; samples keep universe order.
    pub async fn run_round(&self, symbols: &[String], sampled_at: DateTime<Utc>) -> SamplingRound {
        let fetch_timeout = self.fetch_timeout;

        let mut outcomes: Vec<(usize, Result<Sample, FetchFailure>)> =
            stream::iter(symbols.iter().cloned().enumerate())
                .map(|(idx, symbol)| {
                    let context = Arc::clone(&self.context);
                    async move {
                        let task_symbol = symbol.clone();
                        // Each fetch runs in its own task so a panicking upstream only loses that symbol.
                        let mut handle = tokio::spawn(async move {
                            context.fetch(&task_symbol, sampled_at).await
                        });

                        let outcome = match tokio::time::timeout(fetch_timeout, &mut handle).await {
                            Ok(Ok(result)) => result,
                            Ok(Err(join_err)) => Err(FetchFailure::new(
                                symbol,
                                FetchError::Transport(format!("fetch task failed: {join_err}")),
                            )),
                            Err(_) => {
                                handle.abort();
                                Err(FetchFailure::new(symbol, FetchError::Timeout))
                            }
                        };
                        (idx, outcome)
                    }
                })
                .buffer_unordered(self.concurrency_limit)
                .collect()
                .await;

        outcomes.sort_by_key(|(idx, _)| *idx);

        let mut round = SamplingRound::new(sampled_at);
        for (_, outcome) in outcomes {
            match outcome {
                Ok(sample) => round.samples.push(sample),
                Err(failure) => {
                    warn!("{failure}");
                    round.failures.push(failure);
                }
            }
        }

        info!(
            "Round at {} sampled {}/{} symbols ({} failed)",
            sampled_at.to_rfc3339(),
            round.samples.len(),
            symbols.len(),
            round.failures.len()
        );

        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketConfig;
    use crate::fetch::testing::FakeSource;
    use crate::fetch::FetchCache;

    fn executor(source: Arc<FakeSource>, limit: usize, timeout: Duration) -> RoundExecutor {
        let context = FetchContext::new(
            source,
            FetchCache::new(64, Duration::from_secs(300)),
            MarketConfig::default(),
        );
        RoundExecutor::new(Arc::new(context), limit, timeout)
    }

    fn universe(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn one_failure_leaves_the_rest_of_the_round() {
        let source = Arc::new(FakeSource::with_values(&[
            ("A", 72.0),
            ("B", 28.0),
            ("C", 50.0),
            ("D", 61.0),
        ]));
        source.fail("C", FetchError::NotFound);
        let exec = executor(Arc::clone(&source), 2, Duration::from_secs(5));
        let stamp = Utc::now();

        let round = exec.run_round(&universe(&["A", "B", "C", "D"]), stamp).await;

        assert_eq!(round.samples.len(), 3);
        assert_eq!(round.failures.len(), 1);
        assert_eq!(round.failures[0].symbol, "C");
        assert!(round.samples.iter().all(|s| s.sampled_at == stamp));
        let order: Vec<&str> = round.samples.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "D"]);
    }

    #[tokio::test]
    async fn hung_fetch_times_out() {
        let source = Arc::new(FakeSource::with_values(&[("A", 40.0), ("B", 45.0)]));
        source.hang("B");
        let exec = executor(source, 4, Duration::from_millis(50));

        let round = exec.run_round(&universe(&["A", "B"]), Utc::now()).await;

        assert_eq!(round.samples.len(), 1);
        assert_eq!(round.failures[0].cause, FetchError::Timeout);
    }

    #[tokio::test]
    async fn panicking_fetch_is_isolated() {
        let source = Arc::new(FakeSource::with_values(&[("A", 40.0), ("B", 45.0)]));
        source.panic_on("A");
        let exec = executor(source, 4, Duration::from_secs(5));

        let round = exec.run_round(&universe(&["A", "B"]), Utc::now()).await;

        assert_eq!(round.samples.len(), 1);
        assert_eq!(round.samples[0].symbol, "B");
        assert!(matches!(round.failures[0].cause, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let values: Vec<(String, f64)> = (0..12).map(|i| (format!("S{i}"), 50.0)).collect();
        let refs: Vec<(&str, f64)> = values.iter().map(|(s, v)| (s.as_str(), *v)).collect();
        let source = Arc::new(FakeSource::with_values(&refs));
        source.set_delay(Duration::from_millis(20));
        let exec = executor(Arc::clone(&source), 3, Duration::from_secs(5));
        let symbols: Vec<String> = values.iter().map(|(s, _)| s.clone()).collect();

        let round = exec.run_round(&symbols, Utc::now()).await;

        assert_eq!(round.samples.len(), 12);
        assert!(source.max_in_flight() <= 3);
    }
}
