use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::{config::LocalConfig, health_factor_service::AlertSink, runner};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 5;
const POLL_INTERVAL_SECS: u64 = 3;

/// Batch size for the bot-triggered health review.
const BOT_HEALTH_BATCH_SIZE: usize = 200;
/// Deposit floor for the bot-triggered health review.
const BOT_HEALTH_MIN_USD: f64 = 10.0;

/// Sends Markdown messages to the configured Telegram chat. Credentials
/// are optional at construction and only required when a message is
/// actually sent.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn from_config(config: &LocalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: config.telegram_bot_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) => Ok((token, chat_id)),
            _ => bail!("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set"),
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let (token, chat_id) = self.credentials()?;

        self.client
            .post(format!("{TELEGRAM_API_URL}/bot{token}/sendMessage"))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("Telegram sendMessage request failed")?
            .error_for_status()
            .context("Telegram sendMessage rejected")?;

        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.send_message(text).await
    }
}

/// Long-polls Telegram for commands and runs the matching pipeline.
///
/// Supported commands: `/tvlUpdate` runs the full aggregation pass,
/// `/checkHealth` runs a standalone health review. Messages from any
/// other chat are rejected.
pub struct TelegramBot {
    notifier: TelegramNotifier,
    config: LocalConfig,
    last_update_id: i64,
}

impl TelegramBot {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            notifier: TelegramNotifier::from_config(&config),
            config,
            last_update_id: 0,
        }
    }

    #[instrument("TELEGRAM_BOT", skip_all)]
    pub async fn run(mut self) -> Result<()> {
        // Fail fast on missing credentials instead of polling forever.
        self.notifier.credentials()?;
        info!("Telegram bot ready, polling every {}s", POLL_INTERVAL_SECS);

        loop {
            if let Err(e) = self.poll_once().await {
                error!("Telegram polling error: {:#}", e);
            }
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }

    async fn poll_once(&mut self) -> Result<()> {
        let (token, authorized_chat) = self.notifier.credentials()?;
        let token = token.to_string();
        let authorized_chat = authorized_chat.to_string();

        let url = format!(
            "{TELEGRAM_API_URL}/bot{token}/getUpdates?offset={}&timeout={}",
            self.last_update_id + 1,
            POLL_TIMEOUT_SECS
        );
        let data: Value = self
            .notifier
            .client
            .get(&url)
            .send()
            .await
            .context("Telegram getUpdates request failed")?
            .json()
            .await
            .context("Telegram getUpdates response is not valid JSON")?;

        if data["ok"] != Value::Bool(true) {
            bail!("Telegram getUpdates returned ok=false");
        }

        let updates = data["result"].as_array().cloned().unwrap_or_default();
        for update in updates {
            if let Some(update_id) = update["update_id"].as_i64() {
                self.last_update_id = update_id;
            }

            let message = &update["message"];
            let Some(text) = message["text"].as_str() else {
                continue;
            };
            let text = text.trim().to_string();
            let Some(chat_id) = chat_id_of(&message["chat"]["id"]) else {
                continue;
            };
            info!("Command received: {} from {}", text, chat_id);

            if chat_id != authorized_chat {
                error!("Unauthorized access attempt from {}", chat_id);
                if let Err(e) = self.notifier.send_message("❌ Unauthorized").await {
                    error!("Failed to reject unauthorized chat: {:#}", e);
                }
                continue;
            }

            match text.as_str() {
                "/tvlUpdate" => {
                    self.notifier.send_message("⏳ TVL update started...").await?;
                    match runner::run_once(&self.config).await {
                        Ok(()) => {
                            self.notifier.send_message("✅ TVL update complete.").await?
                        }
                        Err(e) => {
                            error!("Run failed during Telegram command: {:#}", e);
                            self.notifier.send_message("❌ TVL update failed.").await?
                        }
                    }
                }
                "/checkHealth" => {
                    self.notifier
                        .send_message(
                            "⏳ HealthFactor review started for wallet above $10USD...",
                        )
                        .await?;
                    match runner::check_health(
                        &self.config,
                        BOT_HEALTH_BATCH_SIZE,
                        BOT_HEALTH_MIN_USD,
                    )
                    .await
                    {
                        Ok(()) => {
                            self.notifier
                                .send_message("✅ HealthFactor review complete.")
                                .await?
                        }
                        Err(e) => {
                            error!("HealthFactor failed during Telegram command: {:#}", e);
                            self.notifier
                                .send_message("❌ HealthFactor review failed.")
                                .await?
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Telegram chat ids arrive as numbers but are compared as strings.
fn chat_id_of(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
