use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod loader;
pub mod universe;
pub mod validator;

pub use loader::expand_env_vars;
pub use universe::{default_symbols, load_universe};

pub const DEFAULT_CONFIG_PATH: &str = "assets/config.json";

/// Candle interval the oscillator is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub fn label(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1W",
            Interval::OneMonth => "1M",
        }
    }

    /// Suffix appended to scanner column names; the daily timeframe has none.
    pub fn column_suffix(self) -> &'static str {
        match self {
            Interval::OneMinute => "|1",
            Interval::FiveMinutes => "|5",
            Interval::FifteenMinutes => "|15",
            Interval::ThirtyMinutes => "|30",
            Interval::OneHour => "|60",
            Interval::TwoHours => "|120",
            Interval::FourHours => "|240",
            Interval::OneDay => "",
            Interval::OneWeek => "|1W",
            Interval::OneMonth => "|1M",
        }
    }

    /// Header of the value column in the history file, e.g. `15m RSI`.
    pub fn value_column(self) -> String {
        format!("{} RSI", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub venue: String,
    pub screener: String,
    pub interval: Interval,
    pub endpoint: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            venue: "BYBIT".to_string(),
            screener: "crypto".to_string(),
            interval: Interval::FifteenMinutes,
            endpoint: "https://scanner.tradingview.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            timeout_secs: 10,
            cache_capacity: 1000,
            cache_ttl_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub ingest_every_secs: u64,
    pub ingest_backoff_secs: u64,
    pub report_every_secs: u64,
}

impl ScheduleConfig {
    pub fn ingest_every(&self) -> Duration {
        Duration::from_secs(self.ingest_every_secs)
    }

    pub fn ingest_backoff(&self) -> Duration {
        Duration::from_secs(self.ingest_backoff_secs)
    }

    pub fn report_every(&self) -> Duration {
        Duration::from_secs(self.report_every_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ingest_every_secs: 180,
            ingest_backoff_secs: 600,
            report_every_secs: 1800,
        }
    }
}

/// Band boundaries used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub overbought: f64,
    pub oversold: f64,
    pub neutral_low: f64,
    pub neutral_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
            neutral_low: 45.0,
            neutral_high: 55.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub discord_webhook: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            discord_webhook: None,
            output_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub market: MarketConfig,
    pub universe_file: PathBuf,
    pub history_file: PathBuf,
    pub fetch: FetchConfig,
    pub schedule: ScheduleConfig,
    pub thresholds: Thresholds,
    pub notify: NotifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Config {
    /// Defaults used when no configuration file is present.
    pub fn builtin() -> Self {
        Self {
            market: MarketConfig::default(),
            universe_file: PathBuf::from("assets/symbols.csv"),
            history_file: PathBuf::from("data/15m_rsi.csv"),
            fetch: FetchConfig::default(),
            schedule: ScheduleConfig::default(),
            thresholds: Thresholds::default(),
            notify: NotifyConfig::default(),
        }
    }
}
