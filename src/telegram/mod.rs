//! Telegram request channel.
//!
//! A manual `getUpdates` long-poll loop: free text is a coin request,
//! `/start` answers with the online message, `/reload` reloads the snapshot
//! cache. Requests are handled one at a time to completion; progress notes
//! from the coordinator are relayed to the requesting chat while its trade
//! runs. Updates that accumulated while the bot was offline are dropped at
//! startup.

use crate::services::TradeCoordinator;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UpdateKind};
use tracing::{error, info, warn};

const POLL_TIMEOUT_SECS: u32 = 30;

pub struct TelegramChannel {
    bot: Bot,
    coordinator: Arc<TradeCoordinator>,
}

impl TelegramChannel {
    pub fn new(token: &str, coordinator: Arc<TradeCoordinator>) -> Self {
        Self {
            bot: Bot::new(token),
            coordinator,
        }
    }

    /// Run the request loop. Does not return under normal operation.
    pub async fn run(&self) {
        info!("Trader bot starting Telegram polling");
        let mut offset = self.drain_pending().await;

        loop {
            let updates = match self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .await
            {
                Ok(updates) => updates,
                Err(e) => {
                    error!("getUpdates failed: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = update.id as i32 + 1;
                let message = match update.kind {
                    UpdateKind::Message(message) | UpdateKind::ChannelPost(message) => message,
                    _ => continue,
                };
                let Some(text) = message.text().map(|t| t.trim().to_string()) else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                self.handle_text(message.chat.id, &text).await;
            }
        }
    }

    /// Skip updates that piled up while the bot was offline.
    async fn drain_pending(&self) -> i32 {
        let mut offset = 0;
        let mut dropped = 0usize;
        loop {
            match self.bot.get_updates().offset(offset).timeout(0).await {
                Ok(updates) if updates.is_empty() => break,
                Ok(updates) => {
                    dropped += updates.len();
                    offset = updates.last().map(|u| u.id as i32 + 1).unwrap_or(offset);
                }
                Err(e) => {
                    warn!("Could not drain pending updates: {e}");
                    break;
                }
            }
        }
        if dropped > 0 {
            info!("Dropped {dropped} pending updates");
        }
        offset
    }

    async fn handle_text(&self, chat_id: ChatId, text: &str) {
        match text {
            "/start" => {
                self.send(chat_id, &self.coordinator.online_message()).await;
            }
            "/reload" => {
                let reply = self.coordinator.reload_cache();
                self.send(chat_id, &reply).await;
            }
            _ if text.starts_with('/') => {
                self.send(chat_id, &format!("Unrecognized command: {text}"))
                    .await;
            }
            _ => {
                info!("Received '{}' from chat {}", text, chat_id.0);

                // Relay progress notes to the requesting chat while the
                // trade runs; requests are strictly sequential so the
                // subscription only ever sees this request's notes.
                let mut progress = self.coordinator.subscribe_progress();
                let bot = self.bot.clone();
                let forwarder = tokio::spawn(async move {
                    while let Ok(note) = progress.recv().await {
                        if let Err(e) = bot.send_message(chat_id, note).await {
                            warn!("Failed to send progress note: {e}");
                        }
                    }
                });

                let reply = self.coordinator.handle_coin_request(text).await;
                forwarder.abort();
                self.send(chat_id, &reply).await;
            }
        }
    }

    async fn send(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.bot.send_message(chat_id, text.to_string()).await {
            error!("Failed to send reply: {e}");
        }
    }
}
