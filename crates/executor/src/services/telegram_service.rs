use std::env;

use async_trait::async_trait;
use common::error::{ConfigError, DispatchError};
use common::traits::NotificationSink;
use teloxide::prelude::*;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("TELEGRAM_BOT_TOKEN".to_string()))?;
        let raw_chat = lookup("TELEGRAM_CHAT_ID")
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("TELEGRAM_CHAT_ID".to_string()))?;
        let chat_id = raw_chat
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid {
                key: "TELEGRAM_CHAT_ID".to_string(),
                value: raw_chat.clone(),
            })?;

        Ok(Self {
            token: token.trim().to_string(),
            chat_id,
        })
    }
}

pub struct TelegramService {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramService {
    pub fn new(config: &TelegramConfig) -> Self {
        info!("Telegram notifications go to chat {}", config.chat_id);
        Self {
            bot: Bot::new(config.token.clone()),
            chat_id: ChatId(config.chat_id),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramService {
    async fn deliver(&self, text: &str) -> Result<(), DispatchError> {
        self.bot
            .send_message(self.chat_id, text.to_string())
            .await
            .map(|_| ())
            .map_err(|e| {
                debug!("Telegram send_message failed: {}", e);
                DispatchError::Delivery(e.to_string())
            })
    }
}
