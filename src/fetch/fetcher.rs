use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::config::{Config, MarketConfig};
use crate::error::{FetchFailure, Result};

use super::{FetchCache, IndicatorKey, IndicatorSource, Sample, ScannerClient};

/// Upstream handle plus the cache in front of it.
///
/// Created once at start-up and shared by every round through an `Arc`, so
/// overlapping rounds reuse each other's cached readings.
pub struct FetchContext {
    source: Arc<dyn IndicatorSource>,
    cache: FetchCache,
    market: MarketConfig,
}

impl FetchContext {
    pub fn new(source: Arc<dyn IndicatorSource>, cache: FetchCache, market: MarketConfig) -> Self {
        Self {
            source,
            cache,
            market,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ScannerClient::new(config.market.endpoint.clone(), config.fetch.timeout())?;
        let cache = FetchCache::new(config.fetch.cache_capacity, config.fetch.cache_ttl());
        Ok(Self::new(Arc::new(client), cache, config.market.clone()))
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    pub fn key_for(&self, symbol: &str) -> IndicatorKey {
        IndicatorKey {
            symbol: symbol.to_string(),
            venue: self.market.venue.clone(),
            screener: self.market.screener.clone(),
            interval: self.market.interval,
        }
    }

    /// Sample one symbol, consulting the cache first. Failures are returned, never cached.
    pub async fn fetch(
        &self,
        symbol: &str,
        sampled_at: DateTime<Utc>,
    ) -> std::result::Result<Sample, FetchFailure> {
        let key = self.key_for(symbol);

        let value = match self.cache.get(&key) {
            Some(value) => {
                debug!("Cache hit for {symbol}");
                value
            }
            None => {
                let value = self
                    .source
                    .fetch_indicator(&key)
                    .await
                    .map_err(|cause| FetchFailure::new(symbol, cause))?;
                self.cache.put(key, value);
                value
            }
        };

        Ok(Sample {
            symbol: symbol.to_string(),
            value,
            sampled_at,
        })
    }
}
