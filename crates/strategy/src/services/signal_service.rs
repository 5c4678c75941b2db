use common::config::SignalParams;
use common::error::{MarketDataError, SignalError};
use common::models::{CandleSeries, CandleStore, Interval, SignalDecision};
use tracing::debug;

use crate::detectors::{KeyLevels, detect_imbalance, detect_pattern};
use crate::indicators::{IndicatorEngine, IndicatorError, IndicatorSnapshot};
use crate::scoring::{CompositeScorer, ScoringInput};

/// A confirmation series shorter than this is not trusted for levels.
const MIN_LEVEL_BARS: usize = 30;

/// Runs indicators, detectors and the scorer for one symbol.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    indicators: IndicatorEngine,
    scorer: CompositeScorer,
}

impl SignalEngine {
    pub fn new(params: SignalParams) -> Self {
        Self {
            indicators: IndicatorEngine::default(),
            scorer: CompositeScorer::new(params),
        }
    }

    /// The primary series is required. Confirmation series are optional: a
    /// missing or short one only drops its own vote.
    pub fn evaluate(
        &self,
        store: &CandleStore,
        symbol: &str,
        primary: Interval,
        confirmations: &[Interval],
        sentiment: Option<f64>,
    ) -> Result<SignalDecision, SignalError> {
        let series = store
            .get(symbol, primary)
            .ok_or(SignalError::DataUnavailable {
                interval: primary,
                source: MarketDataError::NoData,
            })?;

        let snapshot = self
            .indicators
            .compute(series)
            .map_err(|e| indicator_fault(primary, e))?;
        let timestamp = series
            .last()
            .map(|c| c.timestamp)
            .ok_or_else(|| computation(primary, "latest bar"))?;

        let params = self.scorer.params();
        let pattern = detect_pattern(series);
        let imbalance = detect_imbalance(series, params.volume_spike_multiplier);

        let confirmed = self.confirmation_snapshots(store, symbol, confirmations);

        let level_series = confirmations
            .iter()
            .filter_map(|interval| store.get(symbol, *interval))
            .find(|s| s.len() > MIN_LEVEL_BARS)
            .unwrap_or(series);
        let proximity = KeyLevels::from_series(level_series)
            .and_then(|levels| levels.proximity(snapshot.close, params.proximity_threshold));

        let decision = self.scorer.decide(&ScoringInput {
            symbol: series.symbol(),
            timestamp,
            primary: &snapshot,
            pattern,
            imbalance,
            proximity,
            confirmations: &confirmed,
            sentiment,
        });

        if !(decision.long_score.is_finite() && decision.short_score.is_finite()) {
            return Err(computation(primary, "scoring"));
        }

        debug!(
            symbol = series.symbol(),
            long = decision.long_score,
            short = decision.short_score,
            reasons = ?decision.reasons,
            "scored"
        );
        Ok(decision)
    }

    fn confirmation_snapshots(
        &self,
        store: &CandleStore,
        symbol: &str,
        confirmations: &[Interval],
    ) -> Vec<(Interval, IndicatorSnapshot)> {
        confirmations
            .iter()
            .filter_map(|interval| {
                let series: &CandleSeries = store.get(symbol, *interval)?;
                match self.indicators.compute(series) {
                    Ok(snapshot) => Some((*interval, snapshot)),
                    Err(e) => {
                        debug!(symbol, %interval, "confirmation skipped: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn computation(interval: Interval, stage: &str) -> SignalError {
    SignalError::Computation {
        interval,
        stage: stage.to_string(),
    }
}

fn indicator_fault(interval: Interval, error: IndicatorError) -> SignalError {
    match error {
        IndicatorError::InsufficientData { required, actual } => {
            SignalError::InsufficientHistory {
                interval,
                required,
                actual,
            }
        }
        IndicatorError::NonFinite { indicator } => computation(interval, indicator),
        IndicatorError::InvalidPeriod { indicator, .. } => computation(interval, indicator),
    }
}
