pub mod imbalance;
pub mod levels;
pub mod pattern;

pub use imbalance::{Imbalance, detect_imbalance};
pub use levels::{KeyLevels, LevelProximity};
pub use pattern::{CandlePattern, detect_pattern};
