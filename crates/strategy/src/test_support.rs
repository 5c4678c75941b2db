use chrono::{TimeZone, Utc};
use common::models::{Candle, CandleSeries, Interval};

pub fn candle(index: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: Utc.timestamp_opt(index as i64 * 900, 0).unwrap(),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Each bar opens at the previous close and carries 0.5 wicks on both sides.
pub fn series_from_closes(closes: &[f64]) -> CandleSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            candle(i, open, open.max(close) + 0.5, open.min(close) - 0.5, close, 100.0)
        })
        .collect();
    CandleSeries::from_raw("TESTUSDT", Interval::M15, candles).unwrap()
}

pub fn series_from_candles(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::from_raw("TESTUSDT", Interval::M15, candles).unwrap()
}

/// `count` quiet bars around `price`, suitable as filler ahead of a test bar.
pub fn flat_candles(count: usize, price: f64, volume: f64) -> Vec<Candle> {
    (0..count)
        .map(|i| candle(i, price, price + 0.2, price - 0.2, price + 0.05, volume))
        .collect()
}
