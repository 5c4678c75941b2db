pub mod cooldown;
pub mod detectors;
pub mod indicators;
pub mod scoring;
pub mod services;
pub mod targets;

pub use cooldown::CooldownGate;
pub use indicators::{IndicatorEngine, IndicatorSnapshot};
pub use scoring::CompositeScorer;
pub use services::signal_service::SignalEngine;

#[cfg(test)]
mod test_support;
