use common::models::{Candle, CandleSeries, Direction};

const MIN_BARS: usize = 3;
const MAX_BODY_TO_RANGE: f64 = 0.4;
const MIN_WICK_TO_BODY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandlePattern {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
}

impl CandlePattern {
    pub fn direction(&self) -> Direction {
        match self {
            CandlePattern::BullishEngulfing | CandlePattern::Hammer => Direction::Long,
            CandlePattern::BearishEngulfing | CandlePattern::ShootingStar => Direction::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CandlePattern::BullishEngulfing => "bullish engulfing",
            CandlePattern::BearishEngulfing => "bearish engulfing",
            CandlePattern::Hammer => "hammer",
            CandlePattern::ShootingStar => "shooting star",
        }
    }
}

/// Classifies the last one or two bars. Engulfing wins over the wick patterns.
pub fn detect_pattern(series: &CandleSeries) -> Option<CandlePattern> {
    if series.len() < MIN_BARS {
        return None;
    }
    let [prev, last] = series.tail(2) else {
        return None;
    };

    if is_bullish_engulfing(prev, last) {
        Some(CandlePattern::BullishEngulfing)
    } else if is_bearish_engulfing(prev, last) {
        Some(CandlePattern::BearishEngulfing)
    } else if is_hammer(last) {
        Some(CandlePattern::Hammer)
    } else if is_shooting_star(last) {
        Some(CandlePattern::ShootingStar)
    } else {
        None
    }
}

fn is_bullish_engulfing(prev: &Candle, last: &Candle) -> bool {
    prev.is_bearish() && last.is_bullish() && last.close > prev.open && last.open < prev.close
}

fn is_bearish_engulfing(prev: &Candle, last: &Candle) -> bool {
    prev.is_bullish() && last.is_bearish() && last.open > prev.close && last.close < prev.open
}

fn is_small_body(candle: &Candle) -> bool {
    candle.body() < candle.range() * MAX_BODY_TO_RANGE
}

fn is_hammer(candle: &Candle) -> bool {
    let body = candle.body();
    is_small_body(candle)
        && candle.lower_wick() > body * MIN_WICK_TO_BODY
        && candle.upper_wick() < body
}

fn is_shooting_star(candle: &Candle) -> bool {
    let body = candle.body();
    is_small_body(candle)
        && candle.upper_wick() > body * MIN_WICK_TO_BODY
        && candle.lower_wick() < body
}
