use common::models::{CandleSeries, Direction};

pub const VOLUME_LOOKBACK: usize = 50;
const MIN_BODY_RATIO: f64 = 0.5;
const RANGE_EPSILON: f64 = 1e-9;

/// A one-sided bar traded on abnormal volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imbalance {
    pub direction: Direction,
    /// Latest volume over the baseline mean.
    pub volume_ratio: f64,
    pub body_ratio: f64,
}

impl Imbalance {
    pub fn label(&self) -> &'static str {
        match self.direction {
            Direction::Long => "imbalance up",
            Direction::Short => "imbalance down",
        }
    }
}

/// Compares the latest bar against the mean volume of the up to
/// [`VOLUME_LOOKBACK`] bars before it.
pub fn detect_imbalance(series: &CandleSeries, spike_multiplier: f64) -> Option<Imbalance> {
    let (last, history) = series.candles().split_last()?;
    let baseline = &history[history.len().saturating_sub(VOLUME_LOOKBACK)..];
    if baseline.is_empty() {
        return None;
    }

    let mean_volume = baseline.iter().map(|c| c.volume).sum::<f64>() / baseline.len() as f64;
    if mean_volume <= 0.0 {
        return None;
    }

    let body_ratio = last.body() / (last.range() + RANGE_EPSILON);
    let volume_ratio = last.volume / mean_volume;
    if volume_ratio <= spike_multiplier || body_ratio <= MIN_BODY_RATIO {
        return None;
    }

    let direction = if last.is_bullish() {
        Direction::Long
    } else {
        Direction::Short
    };
    Some(Imbalance {
        direction,
        volume_ratio,
        body_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candle, flat_candles, series_from_candles};

    fn with_last(filler: usize, last: common::models::Candle) -> CandleSeries {
        let mut candles = flat_candles(filler, 100.0, 100.0);
        candles.push(last);
        series_from_candles(candles)
    }

    #[test]
    fn flags_bullish_spike() {
        let last = candle(60, 100.0, 102.1, 99.9, 102.0, 250.0);
        let imbalance = detect_imbalance(&with_last(60, last), 1.8).unwrap();

        assert_eq!(imbalance.direction, Direction::Long);
        assert!((imbalance.volume_ratio - 2.5).abs() < 1e-9);
        assert_eq!(imbalance.label(), "imbalance up");
    }

    #[test]
    fn flags_bearish_spike() {
        let last = candle(60, 102.0, 102.1, 99.9, 100.0, 400.0);
        let imbalance = detect_imbalance(&with_last(60, last), 1.8).unwrap();
        assert_eq!(imbalance.direction, Direction::Short);
    }

    #[test]
    fn needs_both_volume_and_body() {
        // big volume, tiny body
        let wicky = candle(60, 100.0, 103.0, 97.0, 100.5, 400.0);
        assert_eq!(detect_imbalance(&with_last(60, wicky), 1.8), None);

        // big body, ordinary volume
        let quiet = candle(60, 100.0, 102.1, 99.9, 102.0, 170.0);
        assert_eq!(detect_imbalance(&with_last(60, quiet), 1.8), None);
    }

    #[test]
    fn exact_multiplier_is_not_a_spike() {
        let last = candle(60, 100.0, 102.1, 99.9, 102.0, 180.0);
        assert_eq!(detect_imbalance(&with_last(60, last), 1.8), None);
    }

    #[test]
    fn uses_all_bars_when_history_is_short() {
        let last = candle(10, 100.0, 102.1, 99.9, 102.0, 250.0);
        assert!(detect_imbalance(&with_last(10, last), 1.8).is_some());

        let alone = series_from_candles(vec![candle(0, 100.0, 102.1, 99.9, 102.0, 250.0)]);
        assert_eq!(detect_imbalance(&alone, 1.8), None);
    }

    #[test]
    fn only_trailing_window_counts() {
        // old heavy bars fall outside the 50-bar baseline
        let mut candles = flat_candles(80, 100.0, 100.0);
        for candle in candles.iter_mut().take(30) {
            candle.volume = 10_000.0;
        }
        candles.push(candle(80, 100.0, 102.1, 99.9, 102.0, 250.0));
        assert!(detect_imbalance(&series_from_candles(candles), 1.8).is_some());
    }
}
