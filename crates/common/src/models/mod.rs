pub mod candle;
pub mod interval;
pub mod signal;

pub use candle::{Candle, CandleSeries, CandleStore};
pub use interval::Interval;
pub use signal::{Direction, SignalDecision, TargetLevels, Vote};
