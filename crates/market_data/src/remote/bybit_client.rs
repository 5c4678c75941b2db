use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::BybitConfig;
use common::error::MarketDataError;
use common::models::{Candle, CandleSeries, Interval};
use common::traits::MarketDataSource;
use reqwest::{Client, StatusCode};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::remote::KlineResponse;
use crate::traits::RemoteResponse;

const MAX_IN_FLIGHT: usize = 5;
const MAX_RETRIES: u32 = 3;

/// Public kline client for Bybit v5. Owns the request budget: concurrent
/// requests are capped, consecutive requests are spaced out and rate-limit
/// answers are retried with exponential backoff.
///
/// One `fetch_candles` call never runs longer than `call_budget`: a backoff
/// that would overrun it ends the call with `RateLimited` instead, and each
/// request only gets the time left in the budget.
pub struct BybitClient {
    client: Client,
    base_url: String,
    category: String,
    semaphore: Arc<Semaphore>,
    request_spacing: Duration,
    last_request: Mutex<Option<Instant>>,
    call_budget: Duration,
    backoff_unit: Duration,
}

impl BybitClient {
    /// `timeout` bounds a whole `fetch_candles` call, retries included.
    pub fn new(config: &BybitConfig, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .user_agent("signal_monitor/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            category: config.category.clone(),
            semaphore: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
            request_spacing: Duration::from_millis(100),
            last_request: Mutex::new(None),
            call_budget: timeout,
            backoff_unit: Duration::from_secs(1),
        })
    }

    pub fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    /// Base of the `unit * 2^n` backoff between rate-limited attempts.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn kline_url(&self) -> String {
        format!("{}/v5/market/kline", self.base_url)
    }

    /// Waits until `request_spacing` has passed since the previous request.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.request_spacing;
            if ready_at > Instant::now() {
                sleep(ready_at - Instant::now()).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let started = Instant::now();
        let mut retry_count = 0;

        loop {
            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|e| MarketDataError::Http(format!("request gate closed: {e}")))?;
            self.pace().await;
            let remaining = self.call_budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(MarketDataError::Timeout);
            }
            let result = self.make_request(symbol, interval, limit, remaining).await;
            drop(permit);

            match result.and_then(|response| response.to_domain()) {
                Err(MarketDataError::RateLimited(reason)) => {
                    retry_count += 1;
                    if retry_count > MAX_RETRIES {
                        return Err(MarketDataError::RateLimited(format!(
                            "max retries exceeded: {reason}"
                        )));
                    }

                    let backoff = self.backoff_unit * 2_u32.pow(retry_count);
                    if started.elapsed() + backoff >= self.call_budget {
                        return Err(MarketDataError::RateLimited(format!(
                            "retry budget exhausted after {retry_count} attempts: {reason}"
                        )));
                    }

                    warn!(
                        "Rate limited for symbol {}, backing off for {:?} (attempt {}/{})",
                        symbol, backoff, retry_count, MAX_RETRIES
                    );
                    sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn make_request(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
        timeout: Duration,
    ) -> Result<KlineResponse, MarketDataError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.kline_url())
            .timeout(timeout)
            .query(&[
                ("category", self.category.as_str()),
                ("symbol", symbol),
                ("interval", interval.as_bybit()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(MarketDataError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Http(format!("HTTP {status}: {body}")));
        }

        if let Some(remaining) = response.headers().get("x-bapi-limit-status") {
            debug!("Bybit request budget remaining: {:?}", remaining);
        }

        response.json::<KlineResponse>().await.map_err(|e| {
            if e.is_decode() {
                MarketDataError::Parse(e.to_string())
            } else {
                request_error(e)
            }
        })
    }
}

fn request_error(e: reqwest::Error) -> MarketDataError {
    if e.is_timeout() {
        MarketDataError::Timeout
    } else {
        MarketDataError::Http(e.to_string())
    }
}

#[async_trait]
impl MarketDataSource for BybitClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, MarketDataError> {
        let candles = self.fetch_klines(symbol, interval, limit).await?;
        debug!("Fetched {} {} candles for {}", candles.len(), interval, symbol);
        CandleSeries::from_raw(symbol, interval, candles)
    }
}
