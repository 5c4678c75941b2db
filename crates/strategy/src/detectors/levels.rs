use common::models::{CandleSeries, Direction};

pub const LEVEL_WINDOW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelProximity {
    NearSupport,
    NearResistance,
}

impl LevelProximity {
    pub fn direction(&self) -> Direction {
        match self {
            LevelProximity::NearSupport => Direction::Long,
            LevelProximity::NearResistance => Direction::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LevelProximity::NearSupport => "near support",
            LevelProximity::NearResistance => "near resistance",
        }
    }
}

/// Support and resistance of a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLevels {
    pub support: f64,
    pub resistance: f64,
}

impl KeyLevels {
    pub fn from_series(series: &CandleSeries) -> Option<Self> {
        let window = series.tail(LEVEL_WINDOW);
        if window.is_empty() {
            return None;
        }
        let support = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let resistance = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            support,
            resistance,
        })
    }

    /// At most one flag; when price sits within the threshold of both levels
    /// the closer one wins, support on an exact tie.
    pub fn proximity(&self, price: f64, threshold: f64) -> Option<LevelProximity> {
        if price <= 0.0 {
            return None;
        }
        let to_support = (price - self.support).abs() / price;
        let to_resistance = (price - self.resistance).abs() / price;

        match (to_support < threshold, to_resistance < threshold) {
            (true, true) if to_resistance < to_support => Some(LevelProximity::NearResistance),
            (true, _) => Some(LevelProximity::NearSupport),
            (false, true) => Some(LevelProximity::NearResistance),
            (false, false) => None,
        }
    }
}
