use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::MarketDataError;
use crate::models::Interval;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.high >= self.low
    }
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Oldest-first candles of one (symbol, interval) pair with strictly
/// increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    interval: Interval,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Normalizes a raw batch: sorts by timestamp and collapses duplicate
    /// timestamps onto the last candle received for them. A malformed candle
    /// rejects the whole batch.
    pub fn from_raw(
        symbol: &str,
        interval: Interval,
        mut raw: Vec<Candle>,
    ) -> Result<Self, MarketDataError> {
        if let Some(bad) = raw.iter().find(|c| !c.is_valid()) {
            return Err(MarketDataError::Parse(format!(
                "{} {}: malformed candle at {}",
                symbol, interval, bad.timestamp
            )));
        }

        // stable sort keeps arrival order among equal timestamps
        raw.sort_by_key(|c| c.timestamp);

        let mut candles: Vec<Candle> = Vec::with_capacity(raw.len());
        for candle in raw {
            match candles.last_mut() {
                Some(last) if last.timestamp == candle.timestamp => *last = candle,
                _ => candles.push(candle),
            }
        }

        Ok(Self {
            symbol: symbol.to_uppercase(),
            interval,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The trailing `n` candles, or all of them when fewer exist.
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.candles.iter().map(|c| c.close)
    }
}

/// Series fetched for one symbol slot, keyed by interval.
#[derive(Debug, Default)]
pub struct CandleStore {
    series: HashMap<(String, Interval), CandleSeries>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: CandleSeries) {
        let key = (series.symbol().to_string(), series.interval());
        self.series.insert(key, series);
    }

    pub fn get(&self, symbol: &str, interval: Interval) -> Option<&CandleSeries> {
        self.series.get(&(symbol.to_uppercase(), interval))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
