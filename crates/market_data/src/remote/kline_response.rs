use chrono::{TimeZone, Utc};
use common::error::MarketDataError;
use common::models::Candle;
use serde::Deserialize;

use crate::traits::RemoteResponse;

/// Bybit answers `10006` / `10018` when the caller exceeds its request budget.
pub const RATE_LIMIT_CODES: [i64; 2] = [10006, 10018];

/// `GET /v5/market/kline` envelope.
#[derive(Debug, Deserialize)]
pub struct KlineResponse {
    #[serde(rename(deserialize = "retCode"))]
    pub ret_code: i64,
    #[serde(rename(deserialize = "retMsg"), default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Option<KlineResult>,
}

#[derive(Debug, Deserialize, Default)]
pub struct KlineResult {
    #[serde(default)]
    pub symbol: String,
    /// Newest first: `[startTimeMs, open, high, low, close, volume, turnover]`.
    #[serde(default)]
    pub list: Vec<Vec<String>>,
}

impl KlineResponse {
    pub fn check(&self) -> Result<(), MarketDataError> {
        if self.ret_code == 0 {
            Ok(())
        } else if RATE_LIMIT_CODES.contains(&self.ret_code) {
            Err(MarketDataError::RateLimited(self.ret_msg.clone()))
        } else {
            Err(MarketDataError::Api {
                code: self.ret_code,
                msg: self.ret_msg.clone(),
            })
        }
    }
}

impl RemoteResponse<Vec<Candle>> for KlineResponse {
    fn to_domain(&self) -> Result<Vec<Candle>, MarketDataError> {
        self.check()?;

        let rows = match &self.result {
            Some(result) if !result.list.is_empty() => &result.list,
            _ => return Err(MarketDataError::NoData),
        };

        rows.iter().map(|row| parse_row(row)).collect()
    }
}

fn parse_row(row: &[String]) -> Result<Candle, MarketDataError> {
    if row.len() < 6 {
        return Err(MarketDataError::Parse(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let start_ms = row[0]
        .parse::<i64>()
        .map_err(|e| MarketDataError::Parse(format!("start time {:?}: {}", row[0], e)))?;
    let timestamp = Utc
        .timestamp_millis_opt(start_ms)
        .single()
        .ok_or_else(|| MarketDataError::Parse(format!("start time out of range: {start_ms}")))?;

    let number = |i: usize| {
        row[i]
            .parse::<f64>()
            .map_err(|e| MarketDataError::Parse(format!("field {} {:?}: {}", i, row[i], e)))
    };

    Ok(Candle {
        timestamp,
        open: number(1)?,
        high: number(2)?,
        low: number(3)?,
        close: number(4)?,
        volume: number(5)?,
    })
}
