//! Decision orchestration.
//!
//! One request flows refresh -> cooldown check -> matcher -> executor ->
//! cooldown record, and every branch ends in exactly one terminal message.
//! Progress notes ("analyzing", "opportunity found") go out on a broadcast
//! channel so the transport can relay them without the coordinator knowing
//! anything about Telegram.

use crate::config::Config;
use crate::services::matcher::{find_opportunity, normalize_symbol};
use crate::services::{Clock, CooldownLedger, SnapshotStore, TradeExecutor};
use crate::types::TradeRequest;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

pub struct TradeCoordinator {
    config: Arc<Config>,
    snapshots: Arc<SnapshotStore>,
    cooldowns: Arc<CooldownLedger>,
    executor: Arc<dyn TradeExecutor>,
    clock: Arc<dyn Clock>,
    /// Per-coin critical sections: the cooldown check-then-record sequence
    /// for one coin must never run concurrently with itself.
    coin_locks: DashMap<String, Arc<Mutex<()>>>,
    progress: broadcast::Sender<String>,
}

impl TradeCoordinator {
    pub fn new(
        config: Arc<Config>,
        snapshots: Arc<SnapshotStore>,
        cooldowns: Arc<CooldownLedger>,
        executor: Arc<dyn TradeExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (progress, _) = broadcast::channel(64);
        Self {
            config,
            snapshots,
            cooldowns,
            executor,
            clock,
            coin_locks: DashMap::new(),
            progress,
        }
    }

    /// Subscribe to progress notes emitted while a request is handled.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<String> {
        self.progress.subscribe()
    }

    fn notify(&self, note: String) {
        // Nobody listening is fine; the final message still goes out.
        let _ = self.progress.send(note);
    }

    /// Health reply for the transport's online command.
    pub fn online_message(&self) -> String {
        format!(
            "Solo Trader Bot is online ({} mode). Post a coin symbol to begin analysis.",
            self.config.mode
        )
    }

    /// Reload the in-memory snapshot from the scanner databases.
    pub fn reload_cache(&self) -> String {
        match self.snapshots.refresh() {
            Ok((listings, balances)) => {
                info!("Cache reloaded on request");
                format!(
                    "✅ Cache reloaded: {} listings, {} balance rows.",
                    listings, balances
                )
            }
            Err(e) => format!("❌ Failed to reload cache: {e}"),
        }
    }

    /// Handle one coin request to completion and return the terminal message.
    pub async fn handle_coin_request(&self, text: &str) -> String {
        let coin = text.trim();
        if coin.is_empty() || coin.len() > 12 || !coin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!("Unrecognized coin symbol: {coin:?}");
        }
        let symbol = normalize_symbol(coin);
        self.notify(format!("🔍 Analyzing {}...", coin.to_uppercase()));

        if let Err(e) = self.snapshots.refresh() {
            warn!("Snapshot refresh failed, serving stale data: {e}");
            self.notify("⚠️ Snapshot refresh failed; using previously cached data.".to_string());
        }

        let lock = self.coin_lock(&symbol);
        let _guard = lock.lock().await;

        match self.cooldowns.is_locked(
            &symbol,
            self.clock.now(),
            self.config.cooldown_window(),
        ) {
            Ok(Some(unlock_time)) => {
                return format!(
                    "❄️ Cooldown active for {}.\nAvailable after {}",
                    symbol,
                    unlock_time.format("%Y-%m-%d %H:%M UTC")
                );
            }
            Ok(None) => {}
            Err(e) => {
                error!("Cooldown lookup failed for {symbol}: {e}");
                return format!("❌ Could not check the cooldown ledger: {e}");
            }
        }

        let snapshot = self.snapshots.snapshot();
        let exchange = match find_opportunity(
            &snapshot,
            &symbol,
            self.config.trade_amount_usdt,
            &self.config.exchange_priority,
        ) {
            Ok(exchange) => exchange,
            Err(reason) => return reason.to_string(),
        };

        info!("Decision: {} selected for {}", exchange, symbol);
        self.notify(format!(
            "⚡ Opportunity found on {}! Attempting trade...",
            exchange.as_str().to_uppercase()
        ));

        let request = TradeRequest {
            coin_symbol: symbol.clone(),
            exchange,
            amount_usdt: self.config.trade_amount_usdt,
            profit_margin_percent: self.config.profit_margin_percent,
        };
        let outcome = self.executor.execute(&request).await;

        if outcome.success {
            if let Err(e) = self.cooldowns.record_trade(&symbol, self.clock.now()) {
                error!("Failed to record cooldown for {symbol}: {e}");
            }
        }
        outcome.message
    }

    fn coin_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        self.coin_locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
