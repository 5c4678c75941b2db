use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

use common::actors::ActorType;
use common::config::MonitorConfig;
use common::logger;
use common::traits::{MarketDataSource, NotificationSink};
use market_data::BybitClient;
use strategy::CooldownGate;

use crate::actors::supervisor::Supervisor;
use crate::services::monitor_service::MonitorService;
use crate::services::telegram_service::{TelegramConfig, TelegramService};

mod actors;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    info!("System starting up...");

    // configuration faults stop the process before anything is scheduled
    let config = Arc::new(MonitorConfig::from_env()?);
    let telegram = TelegramConfig::from_env()?;

    let source: Arc<dyn MarketDataSource> =
        Arc::new(BybitClient::new(&config.bybit, config.fetch_timeout)?);
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramService::new(&telegram));

    // outlives monitor restarts
    let gate = Arc::new(CooldownGate::new(&config.symbols, config.cooldown));

    let mut supervisor = Supervisor::new();
    supervisor.register_actor(
        ActorType::MonitorActor,
        Box::new(move || {
            Box::new(MonitorService::new(
                config.clone(),
                source.clone(),
                sink.clone(),
                gate.clone(),
            ))
        }),
    );

    supervisor.start().await;
    Ok(())
}
