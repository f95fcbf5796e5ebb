use chrono::{DateTime, Utc};

use crate::error::FetchFailure;

pub mod cache;
pub mod fetcher;
pub mod round;
pub mod source;

pub use cache::{FetchCache, IndicatorKey};
pub use fetcher::FetchContext;
pub use round::RoundExecutor;
pub use source::{IndicatorSource, ScannerClient};

/// Default number of in-flight upstream requests per round.
pub const ROUND_CONCURRENCY_LIMIT: usize = 20;

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}

/// One oscillator reading. Immutable once persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub symbol: String,
    pub value: f64,
    pub sampled_at: DateTime<Utc>,
}

/// Outcome of one pass over the universe; all samples share `sampled_at`.
#[derive(Debug, Clone)]
pub struct SamplingRound {
    pub sampled_at: DateTime<Utc>,
    pub samples: Vec<Sample>,
    pub failures: Vec<FetchFailure>,
}

impl SamplingRound {
    pub fn new(sampled_at: DateTime<Utc>) -> Self {
        Self {
            sampled_at,
            samples: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.samples.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
