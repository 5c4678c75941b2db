use async_trait::async_trait;

use crate::error::{DispatchError, MarketDataError};
use crate::models::{CandleSeries, Interval};

/// Source of recent candles. Implementations return a normalized series or an
/// error; they never panic past the call boundary.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, MarketDataError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), DispatchError>;
}

/// Market-wide sentiment on a symmetric scale around zero.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn score(&self) -> anyhow::Result<f64>;
}
