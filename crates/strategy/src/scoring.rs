use chrono::{DateTime, Utc};
use common::config::SignalParams;
use common::models::{Direction, Interval, SignalDecision, Vote};
use tracing::debug;

use crate::detectors::{CandlePattern, Imbalance, LevelProximity};
use crate::indicators::IndicatorSnapshot;
use crate::targets::TargetPolicy;

/// Absorbs the rounding of summed decimal weights at the threshold boundaries.
const SCORE_EPSILON: f64 = 1e-9;

/// Everything the scorer looks at for one symbol in one cycle.
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub symbol: &'a str,
    pub timestamp: DateTime<Utc>,
    pub primary: &'a IndicatorSnapshot,
    pub pattern: Option<CandlePattern>,
    pub imbalance: Option<Imbalance>,
    pub proximity: Option<LevelProximity>,
    pub confirmations: &'a [(Interval, IndicatorSnapshot)],
    pub sentiment: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CompositeScorer {
    params: SignalParams,
    targets: TargetPolicy,
}

impl CompositeScorer {
    pub fn new(params: SignalParams) -> Self {
        Self {
            params,
            targets: TargetPolicy::default(),
        }
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    /// One vote per rule that fires, in a fixed rule order.
    pub fn votes(&self, input: &ScoringInput<'_>) -> Vec<Vote> {
        let w = &self.params.weights;
        let snap = input.primary;
        let mut votes = Vec::new();

        if snap.is_uptrend() {
            votes.push(Vote::new(Direction::Long, w.trend, "EMA fast>slow"));
        } else if snap.is_downtrend() {
            votes.push(Vote::new(Direction::Short, w.trend, "EMA fast<slow"));
        }

        if snap.rsi < self.params.rsi_oversold {
            votes.push(Vote::new(Direction::Long, w.rsi, "RSI low"));
        } else if snap.rsi > self.params.rsi_overbought {
            votes.push(Vote::new(Direction::Short, w.rsi, "RSI high"));
        }

        if snap.macd_histogram > 0.0 {
            votes.push(Vote::new(Direction::Long, w.macd, "MACD+"));
        } else if snap.macd_histogram < 0.0 {
            votes.push(Vote::new(Direction::Short, w.macd, "MACD-"));
        }

        if let Some(vwap) = snap.vwap {
            if snap.close > vwap {
                votes.push(Vote::new(Direction::Long, w.vwap, "above VWAP"));
            } else if snap.close < vwap {
                votes.push(Vote::new(Direction::Short, w.vwap, "below VWAP"));
            }
        }

        if let Some(imbalance) = input.imbalance {
            votes.push(Vote::new(imbalance.direction, w.imbalance, imbalance.label()));
        }

        if let Some(pattern) = input.pattern {
            votes.push(Vote::new(pattern.direction(), w.pattern, pattern.label()));
        }

        if let Some(proximity) = input.proximity {
            votes.push(Vote::new(proximity.direction(), w.level, proximity.label()));
        }

        for (interval, confirmation) in input.confirmations {
            if confirmation.is_uptrend() {
                votes.push(Vote::new(
                    Direction::Long,
                    w.higher_timeframe,
                    format!("{interval} trend up"),
                ));
            } else if confirmation.is_downtrend() {
                votes.push(Vote::new(
                    Direction::Short,
                    w.higher_timeframe,
                    format!("{interval} trend down"),
                ));
            }
        }

        if let Some(sentiment) = input.sentiment {
            if sentiment >= self.params.sentiment_strong {
                votes.push(Vote::new(Direction::Long, w.sentiment, "sentiment bullish"));
            } else if sentiment <= -self.params.sentiment_strong {
                votes.push(Vote::new(Direction::Short, w.sentiment, "sentiment bearish"));
            }
        }

        votes
    }

    /// Winner must reach `min_score` and lead the loser by at least `margin`.
    /// Both comparisons are inclusive.
    pub fn resolve(&self, long_score: f64, short_score: f64) -> Option<Direction> {
        let qualifies = |winner: f64, loser: f64| {
            winner + SCORE_EPSILON >= self.params.min_score
                && winner - loser + SCORE_EPSILON >= self.params.margin
        };
        match (
            qualifies(long_score, short_score),
            qualifies(short_score, long_score),
        ) {
            (true, false) => Some(Direction::Long),
            (false, true) => Some(Direction::Short),
            _ => None,
        }
    }

    /// Strong opposing sentiment cancels a decision; it never creates one.
    fn vetoed(&self, direction: Direction, sentiment: Option<f64>) -> bool {
        let Some(sentiment) = sentiment else {
            return false;
        };
        match direction {
            Direction::Long => sentiment <= -self.params.sentiment_strong,
            Direction::Short => sentiment >= self.params.sentiment_strong,
        }
    }

    pub fn decide(&self, input: &ScoringInput<'_>) -> SignalDecision {
        let votes = self.votes(input);

        let score = |side: Direction| {
            votes
                .iter()
                .filter(|v| v.direction == side)
                .map(|v| v.weight)
                .sum::<f64>()
        };
        let long_score = score(Direction::Long);
        let short_score = score(Direction::Short);

        let mut direction = self.resolve(long_score, short_score);
        if let Some(side) = direction {
            if self.vetoed(side, input.sentiment) {
                debug!(
                    symbol = input.symbol,
                    sentiment = input.sentiment,
                    "{} decision vetoed by sentiment",
                    side
                );
                direction = None;
            }
        }

        let price = input.primary.close;
        let targets = direction.map(|side| self.targets.levels(side, price, Some(input.primary.atr)));

        SignalDecision {
            symbol: input.symbol.to_string(),
            timestamp: input.timestamp,
            direction,
            long_score,
            short_score,
            reasons: votes.into_iter().map(|v| v.reason).collect(),
            price,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::config::RuleWeights;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 100.0,
            ema_fast: 100.0,
            ema_slow: 100.0,
            rsi: 50.0,
            macd_histogram: 0.0,
            atr: 1.0,
            vwap: Some(100.0),
        }
    }

    fn input<'a>(primary: &'a IndicatorSnapshot) -> ScoringInput<'a> {
        ScoringInput {
            symbol: "ABCUSD",
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            primary,
            pattern: None,
            imbalance: None,
            proximity: None,
            confirmations: &[],
            sentiment: None,
        }
    }

    fn scorer(min_score: f64, margin: f64) -> CompositeScorer {
        CompositeScorer::new(SignalParams {
            min_score,
            margin,
            ..SignalParams::default()
        })
    }

    #[test]
    fn neutral_snapshot_casts_no_votes() {
        let snap = snapshot();
        let decision = scorer(3.0, 1.0).decide(&input(&snap));

        assert!(decision.reasons.is_empty());
        assert_eq!(decision.long_score, 0.0);
        assert_eq!(decision.short_score, 0.0);
        assert_eq!(decision.direction, None);
        assert_eq!(decision.targets, None);
    }

    #[test]
    fn bullish_confluence_goes_long() {
        let snap = IndicatorSnapshot {
            ema_fast: 101.0,
            rsi: 30.0,
            macd_histogram: 0.2,
            vwap: Some(99.0),
            ..snapshot()
        };
        let mut scoring_input = input(&snap);
        scoring_input.pattern = Some(CandlePattern::Hammer);

        let decision = scorer(3.0, 1.0).decide(&scoring_input);

        assert_eq!(decision.direction, Some(Direction::Long));
        assert!((decision.long_score - 3.9).abs() < 1e-9);
        assert_eq!(decision.short_score, 0.0);
        assert_eq!(
            decision.reasons,
            vec!["EMA fast>slow", "RSI low", "MACD+", "above VWAP", "hammer"]
        );
        let targets = decision.targets.unwrap();
        assert!(targets.stop_loss < decision.price);
        assert!(decision.price < targets.take_profit_1);
    }

    #[test]
    fn bearish_confluence_goes_short() {
        let snap = IndicatorSnapshot {
            ema_fast: 99.0,
            rsi: 75.0,
            macd_histogram: -0.2,
            vwap: Some(101.0),
            ..snapshot()
        };
        let mut scoring_input = input(&snap);
        scoring_input.imbalance = Some(Imbalance {
            direction: Direction::Short,
            volume_ratio: 3.0,
            body_ratio: 0.8,
        });
        scoring_input.proximity = Some(LevelProximity::NearResistance);

        let decision = scorer(3.0, 1.0).decide(&scoring_input);

        assert_eq!(decision.direction, Some(Direction::Short));
        assert!((decision.short_score - 4.2).abs() < 1e-9);
        let targets = decision.targets.unwrap();
        assert!(targets.stop_loss > decision.price);
        assert!(targets.take_profit_1 > targets.take_profit_2);
    }

    #[test]
    fn threshold_and_margin_are_inclusive() {
        let s = scorer(3.0, 1.0);
        // exactly at the minimum and exactly at the margin
        assert_eq!(s.resolve(3.0, 2.0), Some(Direction::Long));
        assert_eq!(s.resolve(2.0, 3.0), Some(Direction::Short));
        // summed weights that land on the boundary through rounding
        assert_eq!(s.resolve(1.0 + 0.9 + 0.6 + 0.5, 0.8 + 0.4 + 0.8), Some(Direction::Long));
        // just below either boundary
        assert_eq!(s.resolve(3.0 - 1e-6, 0.0), None);
        assert_eq!(s.resolve(3.0, 2.0 + 1e-6), None);
    }

    #[test]
    fn zero_margin_tie_is_no_signal() {
        let s = scorer(2.0, 0.0);
        assert_eq!(s.resolve(2.5, 2.5), None);
        assert_eq!(s.resolve(2.5, 2.4), Some(Direction::Long));
    }

    #[test]
    fn higher_timeframes_vote_per_interval() {
        let snap = snapshot();
        let up = IndicatorSnapshot {
            ema_fast: 105.0,
            ..snapshot()
        };
        let down = IndicatorSnapshot {
            ema_fast: 95.0,
            ..snapshot()
        };
        let confirmations = [(Interval::H1, up), (Interval::H4, down)];
        let mut scoring_input = input(&snap);
        scoring_input.confirmations = &confirmations;

        let votes = scorer(3.0, 1.0).votes(&scoring_input);
        let reasons: Vec<&str> = votes.iter().map(|v| v.reason.as_str()).collect();
        assert_eq!(reasons, vec!["1h trend up", "4h trend down"]);
        assert!(votes.iter().all(|v| v.weight == 0.8));
    }

    #[test]
    fn sentiment_votes_and_vetoes() {
        let snap = IndicatorSnapshot {
            ema_fast: 101.0,
            rsi: 30.0,
            macd_histogram: 0.2,
            vwap: Some(99.0),
            ..snapshot()
        };
        let s = scorer(2.0, 1.0);

        let mut bullish = input(&snap);
        bullish.sentiment = Some(0.9);
        let decision = s.decide(&bullish);
        assert_eq!(decision.direction, Some(Direction::Long));
        assert!(decision.reasons.contains(&"sentiment bullish".to_string()));

        // strongly bearish sentiment cancels the long instead of flipping it
        let mut bearish = input(&snap);
        bearish.sentiment = Some(-0.9);
        let decision = s.decide(&bearish);
        assert_eq!(decision.direction, None);
        assert_eq!(decision.targets, None);
        assert!(decision.reasons.contains(&"sentiment bearish".to_string()));

        // mild sentiment neither votes nor vetoes
        let mut mild = input(&snap);
        mild.sentiment = Some(-0.2);
        let decision = s.decide(&mild);
        assert_eq!(decision.direction, Some(Direction::Long));
        assert!(!decision.reasons.iter().any(|r| r.starts_with("sentiment")));
    }

    #[test]
    fn sentiment_alone_cannot_create_a_signal() {
        let snap = snapshot();
        let mut scoring_input = input(&snap);
        scoring_input.sentiment = Some(5.0);
        let decision = scorer(3.0, 1.0).decide(&scoring_input);
        assert_eq!(decision.direction, None);
    }

    #[test]
    fn weights_come_from_the_table() {
        let snap = IndicatorSnapshot {
            ema_fast: 101.0,
            ..snapshot()
        };
        let s = CompositeScorer::new(SignalParams {
            weights: RuleWeights {
                trend: 3.5,
                ..RuleWeights::default()
            },
            ..SignalParams::default()
        });
        let decision = s.decide(&input(&snap));
        assert_eq!(decision.long_score, 3.5);
        assert_eq!(decision.direction, Some(Direction::Long));
    }
}
