use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

/// Last successful alert per symbol. `None` means never alerted.
type AlertLog = HashMap<String, Option<DateTime<Utc>>>;

/// Keeps a symbol quiet for `window` after each delivered alert.
///
/// Shared between execution contexts through `Arc`; the map sits behind a
/// single async mutex, so holding a [`CooldownGuard`] across the
/// check-dispatch-record sequence serializes alerting per gate.
pub struct CooldownGate {
    window: Duration,
    last_alert: Mutex<AlertLog>,
}

pub struct CooldownGuard<'a> {
    window: Duration,
    last_alert: MutexGuard<'a, AlertLog>,
}

impl CooldownGate {
    pub fn new<S: AsRef<str>>(symbols: &[S], window: Duration) -> Self {
        let last_alert = symbols
            .iter()
            .map(|s| (s.as_ref().to_uppercase(), None))
            .collect();
        Self {
            window,
            last_alert: Mutex::new(last_alert),
        }
    }

    pub async fn lock(&self) -> CooldownGuard<'_> {
        CooldownGuard {
            window: self.window,
            last_alert: self.last_alert.lock().await,
        }
    }

    pub async fn should_suppress(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        self.lock().await.should_suppress(symbol, now)
    }

    pub async fn record_dispatch(&self, symbol: &str, now: DateTime<Utc>) {
        self.lock().await.record_dispatch(symbol, now)
    }

    pub async fn last_alert(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.lock().await.last_alert(symbol)
    }
}

impl CooldownGuard<'_> {
    pub fn should_suppress(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        match self.last_alert(symbol) {
            // a clock that stepped backwards still counts as inside the window
            Some(last) => match now.signed_duration_since(last).to_std() {
                Ok(elapsed) => elapsed < self.window,
                Err(_) => true,
            },
            None => false,
        }
    }

    /// Call only after the alert was actually delivered.
    pub fn record_dispatch(&mut self, symbol: &str, now: DateTime<Utc>) {
        self.last_alert.insert(symbol.to_uppercase(), Some(now));
    }

    pub fn last_alert(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.last_alert
            .get(&symbol.to_uppercase())
            .copied()
            .flatten()
    }
}
