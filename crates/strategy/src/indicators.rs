use common::models::CandleSeries;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage, TrueRange};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("insufficient data: need {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid period for {indicator}: {period}")]
    InvalidPeriod { indicator: &'static str, period: usize },

    #[error("{indicator} produced a non-finite value")]
    NonFinite { indicator: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub min_bars: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 21,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            min_bars: 30,
        }
    }
}

/// Indicator values for the latest bar of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub atr: f64,
    /// `None` when the window carries no volume at all.
    pub vwap: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn is_uptrend(&self) -> bool {
        self.ema_fast > self.ema_slow
    }

    pub fn is_downtrend(&self) -> bool {
        self.ema_fast < self.ema_slow
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    settings: IndicatorSettings,
}

impl IndicatorEngine {
    pub fn new(settings: IndicatorSettings) -> Result<Self, IndicatorError> {
        let periods = [
            ("ema_fast", settings.ema_fast),
            ("ema_slow", settings.ema_slow),
            ("rsi", settings.rsi_period),
            ("macd_fast", settings.macd_fast),
            ("macd_slow", settings.macd_slow),
            ("macd_signal", settings.macd_signal),
            ("atr", settings.atr_period),
        ];
        if let Some((indicator, period)) = periods.into_iter().find(|(_, p)| *p == 0) {
            return Err(IndicatorError::InvalidPeriod { indicator, period });
        }
        // RSI and ATR both need one extra bar for the first delta / previous close
        let floor = settings.rsi_period.max(settings.atr_period) + 1;
        if settings.min_bars < floor {
            return Err(IndicatorError::InvalidPeriod {
                indicator: "min_bars",
                period: settings.min_bars,
            });
        }
        Ok(Self { settings })
    }

    pub fn compute(&self, series: &CandleSeries) -> Result<IndicatorSnapshot, IndicatorError> {
        let s = &self.settings;
        if series.len() < s.min_bars {
            return Err(IndicatorError::InsufficientData {
                required: s.min_bars,
                actual: series.len(),
            });
        }

        let mut ema_fast = ema(s.ema_fast, "ema_fast")?;
        let mut ema_slow = ema(s.ema_slow, "ema_slow")?;
        let mut macd_fast = ema(s.macd_fast, "macd_fast")?;
        let mut macd_slow = ema(s.macd_slow, "macd_slow")?;
        let mut macd_signal = ema(s.macd_signal, "macd_signal")?;
        let mut avg_gain = sma(s.rsi_period, "rsi")?;
        let mut avg_loss = sma(s.rsi_period, "rsi")?;
        let mut avg_true_range = sma(s.atr_period, "atr")?;
        let mut true_range = TrueRange::new();

        let mut fast = 0.0;
        let mut slow = 0.0;
        let mut histogram = 0.0;
        let mut gain = 0.0;
        let mut loss = 0.0;
        let mut atr = 0.0;
        let mut pv_sum = 0.0;
        let mut volume_sum = 0.0;
        let mut prev_close: Option<f64> = None;

        for candle in series.candles() {
            fast = ema_fast.next(candle.close);
            slow = ema_slow.next(candle.close);

            let macd_line = macd_fast.next(candle.close) - macd_slow.next(candle.close);
            histogram = macd_line - macd_signal.next(macd_line);

            let tr = true_range.next(candle);
            if let Some(prev) = prev_close {
                let delta = candle.close - prev;
                gain = avg_gain.next(delta.max(0.0));
                loss = avg_loss.next((-delta).max(0.0));
                // the first bar has no previous close, its range is not a true range
                atr = avg_true_range.next(tr);
            }
            prev_close = Some(candle.close);

            pv_sum += candle.close * candle.volume;
            volume_sum += candle.volume;
        }

        let snapshot = IndicatorSnapshot {
            close: prev_close.unwrap_or_default(),
            ema_fast: fast,
            ema_slow: slow,
            rsi: rsi_from_averages(gain, loss),
            macd_histogram: histogram,
            atr,
            vwap: (volume_sum > 0.0).then(|| pv_sum / volume_sum),
        };
        snapshot.ensure_finite()?;
        Ok(snapshot)
    }
}

impl IndicatorSnapshot {
    fn ensure_finite(&self) -> Result<(), IndicatorError> {
        let values = [
            ("close", self.close),
            ("ema", self.ema_fast),
            ("ema", self.ema_slow),
            ("rsi", self.rsi),
            ("macd", self.macd_histogram),
            ("atr", self.atr),
            ("vwap", self.vwap.unwrap_or_default()),
        ];
        match values.into_iter().find(|(_, v)| !v.is_finite()) {
            Some((indicator, _)) => Err(IndicatorError::NonFinite { indicator }),
            None => Ok(()),
        }
    }
}

/// A zero average loss is replaced by 1 rather than special-cased, so a series
/// without down moves reads as `100 * gain / (1 + gain)`.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let denominator = if avg_loss != 0.0 { avg_loss } else { 1.0 };
    100.0 - 100.0 / (1.0 + avg_gain / denominator)
}

fn ema(period: usize, indicator: &'static str) -> Result<ExponentialMovingAverage, IndicatorError> {
    ExponentialMovingAverage::new(period)
        .map_err(|_| IndicatorError::InvalidPeriod { indicator, period })
}

fn sma(period: usize, indicator: &'static str) -> Result<SimpleMovingAverage, IndicatorError> {
    SimpleMovingAverage::new(period).map_err(|_| IndicatorError::InvalidPeriod { indicator, period })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_from_closes;

    #[test]
    fn short_series_is_insufficient() {
        let engine = IndicatorEngine::default();
        for len in [0, 1, 15, 29] {
            let closes: Vec<f64> = (0..len).map(|i| 100.0 + i as f64).collect();
            let err = engine.compute(&series_from_closes(&closes)).unwrap_err();
            assert_eq!(
                err,
                IndicatorError::InsufficientData {
                    required: 30,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn rising_closes_put_fast_ema_above_slow() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        let snapshot = IndicatorEngine::default()
            .compute(&series_from_closes(&closes))
            .unwrap();

        assert!(snapshot.ema_fast > snapshot.ema_slow);
        assert!(snapshot.is_uptrend());
        assert!(snapshot.macd_histogram.is_finite());
        assert_eq!(snapshot.close, 119.5);
    }

    #[test]
    fn ema_seeds_with_first_close() {
        // alpha = 2 / (3 + 1) = 0.5
        let mut ema = ema(3, "ema").unwrap();
        assert!((ema.next(10.0) - 10.0).abs() < 1e-10);
        assert!((ema.next(11.0) - 10.5).abs() < 1e-10);
        assert!((ema.next(12.0) - 11.25).abs() < 1e-10);
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let zigzag: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect();
        let falling: Vec<f64> = (0..60).map(|i| 500.0 - i as f64 * 3.0).collect();
        let rising: Vec<f64> = (0..60).map(|i| 500.0 + i as f64 * 40.0).collect();

        for closes in [zigzag, falling, rising] {
            let snapshot = IndicatorEngine::default()
                .compute(&series_from_closes(&closes))
                .unwrap();
            assert!((0.0..=100.0).contains(&snapshot.rsi), "rsi {}", snapshot.rsi);
        }
    }

    #[test]
    fn rsi_without_losses_uses_unit_denominator() {
        // average gain of 40 over a loss-free window: 100 - 100 / 41
        let rising: Vec<f64> = (0..60).map(|i| 500.0 + i as f64 * 40.0).collect();
        let snapshot = IndicatorEngine::default()
            .compute(&series_from_closes(&rising))
            .unwrap();
        assert!((snapshot.rsi - (100.0 - 100.0 / 41.0)).abs() < 1e-9);

        let falling: Vec<f64> = (0..60).map(|i| 500.0 - i as f64 * 3.0).collect();
        let snapshot = IndicatorEngine::default()
            .compute(&series_from_closes(&falling))
            .unwrap();
        assert!(snapshot.rsi.abs() < 1e-9);
    }

    #[test]
    fn atr_is_mean_of_recent_true_ranges() {
        // every bar moves 1.0 with 0.5 wicks either side: true range is 2.0
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let snapshot = IndicatorEngine::default()
            .compute(&series_from_closes(&closes))
            .unwrap();
        assert!((snapshot.atr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn vwap_covers_the_whole_window() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let snapshot = IndicatorEngine::default()
            .compute(&series_from_closes(&closes))
            .unwrap();
        // equal volumes: vwap is the plain mean of closes
        assert!((snapshot.vwap.unwrap() - 114.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_periods_and_short_minimum() {
        let zero = IndicatorSettings {
            ema_fast: 0,
            ..IndicatorSettings::default()
        };
        assert!(IndicatorEngine::new(zero).is_err());

        let short = IndicatorSettings {
            min_bars: 10,
            ..IndicatorSettings::default()
        };
        assert!(IndicatorEngine::new(short).is_err());
    }

    #[test]
    fn identical_input_gives_identical_snapshot() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64).cos()).collect();
        let engine = IndicatorEngine::default();
        let a = engine.compute(&series_from_closes(&closes)).unwrap();
        let b = engine.compute(&series_from_closes(&closes)).unwrap();
        assert_eq!(a, b);
    }
}
