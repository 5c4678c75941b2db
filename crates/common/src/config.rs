use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Interval;

const DEFAULT_SYMBOLS: &[&str; 20] = &[
    "BTCUSDT",
    "ETHUSDT",
    "SOLUSDT",
    "XRPUSDT",
    "BNBUSDT",
    "ADAUSDT",
    "AVAXUSDT",
    "DOTUSDT",
    "LTCUSDT",
    "LINKUSDT",
    "MATICUSDT",
    "DOGEUSDT",
    "OPUSDT",
    "ARBUSDT",
    "APTUSDT",
    "NEARUSDT",
    "ATOMUSDT",
    "FILUSDT",
    "SUIUSDT",
    "TONUSDT",
];

const MAX_CONFIRMATION_INTERVALS: usize = 2;

/// Weight of every voting rule. Supplied as a JSON object through
/// `SIGNAL_WEIGHTS`; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleWeights {
    pub trend: f64,
    pub rsi: f64,
    pub macd: f64,
    pub vwap: f64,
    pub imbalance: f64,
    pub pattern: f64,
    pub level: f64,
    pub higher_timeframe: f64,
    pub sentiment: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            trend: 1.0,
            rsi: 0.9,
            macd: 0.6,
            vwap: 0.4,
            imbalance: 0.8,
            pattern: 1.0,
            level: 0.5,
            higher_timeframe: 0.8,
            sentiment: 0.75,
        }
    }
}

impl RuleWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("trend", self.trend),
            ("rsi", self.rsi),
            ("macd", self.macd),
            ("vwap", self.vwap),
            ("imbalance", self.imbalance),
            ("pattern", self.pattern),
            ("level", self.level),
            ("higher_timeframe", self.higher_timeframe),
            ("sentiment", self.sentiment),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    key: format!("SIGNAL_WEIGHTS.{name}"),
                    reason: format!("weight must be positive, got {weight}"),
                });
            }
        }
        Ok(())
    }
}

/// Thresholds of the composite scorer and its detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub min_score: f64,
    pub margin: f64,
    pub proximity_threshold: f64,
    pub volume_spike_multiplier: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub sentiment_strong: f64,
    pub weights: RuleWeights,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            min_score: 3.0,
            margin: 1.0,
            proximity_threshold: 0.005,
            volume_spike_multiplier: 1.8,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            sentiment_strong: 0.5,
            weights: RuleWeights::default(),
        }
    }
}

impl SignalParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_score.is_finite() && self.min_score > 0.0) {
            return Err(out_of_range("MIN_COMPOSITE_SCORE", "must be positive"));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(out_of_range("COMPOSITE_MARGIN", "must not be negative"));
        }
        if !(self.proximity_threshold > 0.0 && self.proximity_threshold <= 0.05) {
            return Err(out_of_range("PROXIMITY_THRESHOLD", "must be in (0, 0.05]"));
        }
        if !(self.volume_spike_multiplier.is_finite() && self.volume_spike_multiplier > 1.0) {
            return Err(out_of_range("VOLUME_SPIKE_MULTIPLIER", "must be greater than 1"));
        }
        if !(0.0 < self.rsi_oversold
            && self.rsi_oversold < self.rsi_overbought
            && self.rsi_overbought < 100.0)
        {
            return Err(out_of_range(
                "RSI_OVERSOLD/RSI_OVERBOUGHT",
                "need 0 < oversold < overbought < 100",
            ));
        }
        if !(self.sentiment_strong.is_finite() && self.sentiment_strong > 0.0) {
            return Err(out_of_range("SENTIMENT_STRONG", "must be positive"));
        }
        self.weights.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BybitConfig {
    pub base_url: String,
    pub category: String,
}

/// Everything the monitor needs, read and validated once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub symbols: Vec<String>,
    pub primary_interval: Interval,
    pub confirmation_intervals: Vec<Interval>,
    pub cooldown: Duration,
    pub cycle_interval: Duration,
    pub min_cycle_sleep: Duration,
    pub symbol_pacing: Duration,
    pub candle_limit: usize,
    pub fetch_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub signal: SignalParams,
    pub bybit: BybitConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            primary_interval: Interval::M15,
            confirmation_intervals: vec![Interval::H1],
            cooldown: Duration::from_secs(1800),
            cycle_interval: Duration::from_secs(300),
            min_cycle_sleep: Duration::from_secs(5),
            symbol_pacing: Duration::from_millis(1200),
            candle_limit: 200,
            fetch_timeout: Duration::from_secs(10),
            dispatch_timeout: Duration::from_secs(10),
            signal: SignalParams::default(),
            bybit: BybitConfig {
                base_url: "https://api.bybit.com".to_string(),
                category: "linear".to_string(),
            },
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let symbols = match get("SYMBOLS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.symbols.clone(),
        };

        let confirmation_intervals = match get("CONFIRM_INTERVALS") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("none") => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(Interval::from_str)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.confirmation_intervals.clone(),
        };

        let weights = match get("SIGNAL_WEIGHTS") {
            Some(raw) => serde_json::from_str::<RuleWeights>(&raw).map_err(|e| {
                ConfigError::Invalid {
                    key: "SIGNAL_WEIGHTS".to_string(),
                    value: e.to_string(),
                }
            })?,
            None => RuleWeights::default(),
        };

        let signal = SignalParams {
            min_score: parse_or(&get, "MIN_COMPOSITE_SCORE", defaults.signal.min_score)?,
            margin: parse_or(&get, "COMPOSITE_MARGIN", defaults.signal.margin)?,
            proximity_threshold: parse_or(
                &get,
                "PROXIMITY_THRESHOLD",
                defaults.signal.proximity_threshold,
            )?,
            volume_spike_multiplier: parse_or(
                &get,
                "VOLUME_SPIKE_MULTIPLIER",
                defaults.signal.volume_spike_multiplier,
            )?,
            rsi_oversold: parse_or(&get, "RSI_OVERSOLD", defaults.signal.rsi_oversold)?,
            rsi_overbought: parse_or(&get, "RSI_OVERBOUGHT", defaults.signal.rsi_overbought)?,
            sentiment_strong: parse_or(&get, "SENTIMENT_STRONG", defaults.signal.sentiment_strong)?,
            weights,
        };

        let config = Self {
            symbols,
            primary_interval: parse_or(&get, "PRIMARY_INTERVAL", defaults.primary_interval)?,
            confirmation_intervals,
            cooldown: Duration::from_secs(parse_secs(&get, "COOLDOWN", 1800)?),
            cycle_interval: Duration::from_secs(parse_secs(&get, "CHECK_INTERVAL", 300)?),
            min_cycle_sleep: Duration::from_secs(parse_secs(&get, "MIN_CYCLE_SLEEP", 5)?),
            symbol_pacing: Duration::from_millis(parse_secs(&get, "SYMBOL_PACING_MS", 1200)?),
            candle_limit: parse_or(&get, "KLIMIT", defaults.candle_limit)?,
            fetch_timeout: Duration::from_secs(parse_secs(&get, "FETCH_TIMEOUT_SECS", 10)?),
            dispatch_timeout: Duration::from_secs(parse_secs(&get, "DISPATCH_TIMEOUT_SECS", 10)?),
            signal,
            bybit: BybitConfig {
                base_url: get("BYBIT_BASE_URL").unwrap_or(defaults.bybit.base_url),
                category: get("BYBIT_CATEGORY").unwrap_or(defaults.bybit.category),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(out_of_range("SYMBOLS", "at least one symbol is required"));
        }
        if self.confirmation_intervals.len() > MAX_CONFIRMATION_INTERVALS {
            return Err(out_of_range("CONFIRM_INTERVALS", "at most two intervals"));
        }
        if self
            .confirmation_intervals
            .iter()
            .any(|i| *i <= self.primary_interval)
        {
            return Err(out_of_range(
                "CONFIRM_INTERVALS",
                "confirmation intervals must be longer than the primary interval",
            ));
        }
        if self.cooldown.is_zero() {
            return Err(out_of_range("COOLDOWN", "must be positive"));
        }
        if self.cycle_interval.is_zero() {
            return Err(out_of_range("CHECK_INTERVAL", "must be positive"));
        }
        if !(30..=1000).contains(&self.candle_limit) {
            return Err(out_of_range("KLIMIT", "must be within 30..=1000"));
        }
        if self.fetch_timeout.is_zero() || self.dispatch_timeout.is_zero() {
            return Err(out_of_range("FETCH_TIMEOUT_SECS/DISPATCH_TIMEOUT_SECS", "must be positive"));
        }
        self.signal.validate()
    }
}

fn out_of_range(key: &str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Durations are unsigned so a negative value is rejected here, at startup.
fn parse_secs<G>(get: &G, key: &str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default)
}
