use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Context, FetchError, Result};

use super::IndicatorKey;

/// Opaque upstream that yields one oscillator reading per request.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn fetch_indicator(&self, key: &IndicatorKey) -> std::result::Result<f64, FetchError>;
}

/// Client for the TradingView scanner `scan` endpoint.
pub struct ScannerClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    s: String,
    #[serde(default)]
    d: Vec<Value>,
}

impl ScannerClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct scanner HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn scan_url(&self, screener: &str) -> String {
        format!("{}/{}/scan", self.endpoint.trim_end_matches('/'), screener)
    }
}

#[async_trait]
impl IndicatorSource for ScannerClient {
    async fn fetch_indicator(&self, key: &IndicatorKey) -> std::result::Result<f64, FetchError> {
        let ticker = ticker_for(key);
        let body = json!({
            "symbols": { "tickers": [ticker], "query": { "types": [] } },
            "columns": [format!("RSI{}", key.interval.column_suffix())],
        });

        let response = self
            .client
            .post(self.scan_url(&key.screener))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        let text = response.text().await?;
        parse_scan_response(&text, &ticker)
    }
}

pub fn ticker_for(key: &IndicatorKey) -> String {
    format!("{}:{}", key.venue, key.symbol)
}

/// Extract the single indicator column for `ticker` from a scanner payload.
pub fn parse_scan_response(text: &str, ticker: &str) -> std::result::Result<f64, FetchError> {
    let parsed: ScanResponse =
        serde_json::from_str(text).map_err(|err| FetchError::Malformed(err.to_string()))?;

    let row = parsed
        .data
        .iter()
        .find(|row| row.s.eq_ignore_ascii_case(ticker))
        .ok_or(FetchError::NotFound)?;

    let value = row
        .d
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::Malformed(format!("no indicator value for {ticker}")))?;

    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(FetchError::Malformed(format!(
            "indicator value {value} for {ticker} is outside 0..=100"
        )));
    }

    Ok(value)
}
