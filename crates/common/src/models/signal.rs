use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Used to place levels on the right side of price.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// One weighted opinion from a single rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub direction: Direction,
    pub weight: f64,
    pub reason: String,
}

impl Vote {
    pub fn new(direction: Direction, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            direction,
            weight,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLevels {
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub take_profit_3: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecision {
    pub symbol: String,
    /// Open time of the primary-interval bar the decision was computed on.
    pub timestamp: DateTime<Utc>,
    /// `None` means no signal this cycle.
    pub direction: Option<Direction>,
    pub long_score: f64,
    pub short_score: f64,
    pub reasons: Vec<String>,
    pub price: f64,
    /// Present exactly when `direction` is.
    pub targets: Option<TargetLevels>,
}
