use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage, HeartbeatGuard};
use common::config::MonitorConfig;
use common::error::{DispatchError, MarketDataError, SignalError};
use common::models::{CandleStore, Interval, SignalDecision};
use common::traits::{MarketDataSource, NotificationSink, SentimentSource};
use strategy::{CooldownGate, SignalEngine};

use crate::services::alert::format_alert;

/// What happened to each symbol during one pass.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub id: Uuid,
    pub decisions: Vec<SignalDecision>,
    pub sent: Vec<String>,
    pub suppressed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
}

/// Drives the periodic pass over the symbol universe: fetch, score, consult
/// the cooldown gate, dispatch.
pub struct MonitorService {
    config: Arc<MonitorConfig>,
    source: Arc<dyn MarketDataSource>,
    sink: Arc<dyn NotificationSink>,
    sentiment: Option<Arc<dyn SentimentSource>>,
    gate: Arc<CooldownGate>,
    engine: SignalEngine,
}

#[async_trait]
impl Actor for MonitorService {
    fn name(&self) -> ActorType {
        ActorType::MonitorActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = HeartbeatGuard(self.spawn_heartbeat(supervisor_tx.clone()));

        info!(
            "Starting signal monitor: {} symbols, primary {}, confirmations {:?}",
            self.config.symbols.len(),
            self.config.primary_interval,
            self.config.confirmation_intervals
        );

        loop {
            let started = Instant::now();
            let report = self.run_cycle().await;

            if report.skipped.len() == self.config.symbols.len() {
                let err_msg = format!("every symbol skipped in cycle {}", report.id);
                if let Err(e) = supervisor_tx
                    .send(ControlMessage::Error(self.name(), err_msg))
                    .await
                {
                    anyhow::bail!("supervisor channel closed: {}", e);
                }
            }

            let pause = next_sleep(
                self.config.cycle_interval,
                self.config.min_cycle_sleep,
                started.elapsed(),
            );
            debug!("Next cycle in {:?}", pause);
            time::sleep(pause).await;
        }
    }
}

impl MonitorService {
    pub fn new(
        config: Arc<MonitorConfig>,
        source: Arc<dyn MarketDataSource>,
        sink: Arc<dyn NotificationSink>,
        gate: Arc<CooldownGate>,
    ) -> Self {
        let engine = SignalEngine::new(config.signal.clone());
        Self {
            config,
            source,
            sink,
            sentiment: None,
            gate,
            engine,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentSource>) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// One full pass over the configured symbols, in order. Per-symbol faults
    /// end up in the report, never in the return type.
    pub async fn run_cycle(&self) -> CycleReport {
        let id = Uuid::new_v4();
        let span = info_span!("cycle", %id);

        async move {
            let started = Instant::now();
            let mut report = CycleReport {
                id,
                ..CycleReport::default()
            };
            let sentiment = self.fetch_sentiment().await;

            for (i, symbol) in self.config.symbols.iter().enumerate() {
                if i > 0 && !self.config.symbol_pacing.is_zero() {
                    time::sleep(self.config.symbol_pacing).await;
                }
                self.process_symbol(symbol, sentiment, &mut report).await;
            }

            info!(
                decisions = report.decisions.len(),
                sent = report.sent.len(),
                suppressed = report.suppressed.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cycle complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn process_symbol(&self, symbol: &str, sentiment: Option<f64>, report: &mut CycleReport) {
        debug!("Checking {}", symbol);

        let decision = match self.load_store(symbol).await.and_then(|store| {
            self.engine.evaluate(
                &store,
                symbol,
                self.config.primary_interval,
                &self.config.confirmation_intervals,
                sentiment,
            )
        }) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Skipping {}: {}", symbol, e);
                report.skipped.push((symbol.to_string(), e.to_string()));
                return;
            }
        };

        let alert = format_alert(&decision);
        report.decisions.push(decision);
        let Some(text) = alert else {
            return;
        };

        // held across check, dispatch and record
        let mut gate = self.gate.lock().await;
        if gate.should_suppress(symbol, Utc::now()) {
            debug!("{} inside cooldown, alert suppressed", symbol);
            report.suppressed.push(symbol.to_string());
            return;
        }

        match self.dispatch(&text).await {
            Ok(()) => {
                gate.record_dispatch(symbol, Utc::now());
                if let Some(decision) = report.decisions.last() {
                    info!(
                        symbol,
                        direction = ?decision.direction,
                        long = decision.long_score,
                        short = decision.short_score,
                        "alert sent"
                    );
                }
                report.sent.push(symbol.to_string());
            }
            Err(e) => {
                warn!("Alert for {} not delivered: {}", symbol, e);
                report.failed.push((symbol.to_string(), e.to_string()));
            }
        }
    }

    /// Primary series is required; a failed confirmation fetch only leaves
    /// its interval out of the store.
    async fn load_store(&self, symbol: &str) -> Result<CandleStore, SignalError> {
        let primary = self.config.primary_interval;
        let intervals: Vec<Interval> = std::iter::once(primary)
            .chain(self.config.confirmation_intervals.iter().copied())
            .collect();

        let fetches = intervals.into_iter().map(|interval| async move {
            let fetched = time::timeout(
                self.config.fetch_timeout,
                self.source
                    .fetch_candles(symbol, interval, self.config.candle_limit),
            )
            .await
            .unwrap_or(Err(MarketDataError::Timeout));
            (interval, fetched)
        });

        let mut store = CandleStore::new();
        for (interval, fetched) in join_all(fetches).await {
            match fetched {
                Ok(series) => store.insert(series),
                Err(source) if interval == primary => {
                    return Err(SignalError::DataUnavailable { interval, source });
                }
                Err(e) => debug!(symbol, %interval, "confirmation fetch failed: {}", e),
            }
        }
        Ok(store)
    }

    async fn dispatch(&self, text: &str) -> Result<(), SignalError> {
        time::timeout(self.config.dispatch_timeout, self.sink.deliver(text))
            .await
            .unwrap_or(Err(DispatchError::Timeout))?;
        Ok(())
    }

    async fn fetch_sentiment(&self) -> Option<f64> {
        let source = self.sentiment.as_ref()?;
        match time::timeout(self.config.fetch_timeout, source.score()).await {
            Ok(Ok(score)) if score.is_finite() => Some(score),
            Ok(Ok(score)) => {
                warn!("Ignoring non-finite sentiment {}", score);
                None
            }
            Ok(Err(e)) => {
                warn!("Sentiment unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!("Sentiment fetch timed out");
                None
            }
        }
    }
}

/// Pause before the next pass: whatever is left of the target interval, but
/// never less than `floor`.
pub fn next_sleep(target: Duration, floor: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed).max(floor)
}
