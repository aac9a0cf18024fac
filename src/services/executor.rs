//! Trade execution.
//!
//! `TradeExecutor` is the seam between deciding and doing: the simulation
//! variant narrates the trade it would have placed, the live variant walks a
//! real buy-then-sell sequence against the chosen venue. Which one handles
//! requests is fixed at construction time from the configured mode.

use crate::config::{Config, SettlementConfig};
use crate::error::{AppError, Result};
use crate::exchanges::{build_client, Exchange, ExchangeCredentials, OrderParams};
use crate::types::{ExchangeId, TradeMode, TradeOutcome, TradePhase, TradeRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Execute (or simulate) a buy-then-sell round for the request. Failures
    /// are converted to a user-facing outcome here; this never panics the
    /// request loop.
    async fn execute(&self, request: &TradeRequest) -> TradeOutcome;
}

/// Dry-run executor used to verify the decision path without touching any
/// exchange.
pub struct SimulationTrader;

#[async_trait]
impl TradeExecutor for SimulationTrader {
    async fn execute(&self, request: &TradeRequest) -> TradeOutcome {
        let message = format!(
            "✅ [SIMULATION] Trade executed!\n\n\
             Coin: {}\n\
             Exchange: {}\n\
             Amount: ${} USDT\n\n\
             A market BUY order and a limit SELL order at +{}% would be placed now.",
            request.coin_symbol,
            request.exchange.as_str().to_uppercase(),
            request.amount_usdt,
            request.profit_margin_percent
        );
        info!("{message}");
        TradeOutcome::success(message)
    }
}

/// Live executor: market buy, settlement polling, limit sell.
pub struct LiveTrader {
    exchanges: HashMap<ExchangeId, Arc<dyn Exchange>>,
    order_params: HashMap<ExchangeId, OrderParams>,
    settlement: SettlementConfig,
}

impl LiveTrader {
    pub fn new(settlement: SettlementConfig) -> Self {
        Self {
            exchanges: HashMap::new(),
            order_params: default_order_params(),
            settlement,
        }
    }

    /// Build clients for every priority venue that has credentials; venues
    /// without credentials are skipped and logged, not fatal.
    pub fn from_credentials(
        credentials: &HashMap<ExchangeId, ExchangeCredentials>,
        priority: &[ExchangeId],
        settlement: SettlementConfig,
    ) -> Self {
        let mut trader = Self::new(settlement);
        for id in priority {
            match credentials.get(id) {
                Some(creds) => {
                    trader
                        .exchanges
                        .insert(*id, build_client(*id, Some(creds.clone())));
                }
                None => warn!("API credentials for {id} not found, venue disabled"),
            }
        }
        trader
    }

    /// Register a client directly (used by tests to inject a scripted venue).
    pub fn with_exchange(mut self, client: Arc<dyn Exchange>) -> Self {
        self.exchanges.insert(client.id(), client);
        self
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    async fn try_execute(&self, request: &TradeRequest, phase: &mut TradePhase) -> Result<String> {
        let exchange = self.exchanges.get(&request.exchange).ok_or_else(|| {
            AppError::MissingCredentials {
                exchange: request.exchange.to_string(),
            }
        })?;
        let base = request.base_currency();

        let ticker = exchange.fetch_ticker(&request.coin_symbol).await?;
        if ticker.last <= 0.0 {
            return Err(AppError::PriceUnavailable {
                exchange: request.exchange.to_string(),
                symbol: request.coin_symbol.clone(),
            });
        }
        *phase = TradePhase::PriceFetched;
        debug!(phase = %phase, price = ticker.last, "ticker fetched");

        let quantity = request.amount_usdt / ticker.last;
        info!(
            "Placing market BUY for ~{:.8} {}",
            quantity, request.coin_symbol
        );
        let buy = exchange
            .create_market_buy_order(&request.coin_symbol, quantity)
            .await?;
        *phase = TradePhase::BuySubmitted;
        debug!(phase = %phase, order_id = %buy.id, "market buy sent");

        *phase = TradePhase::PollingSettlement;
        let settled = match self.poll_settlement(exchange.as_ref(), base).await {
            Ok(settled) => settled,
            Err(e) => {
                if matches!(e, AppError::SettlementTimeout { .. }) {
                    *phase = TradePhase::SettlementTimedOut;
                }
                return Err(e);
            }
        };

        let sell_price = ticker.last * (1.0 + request.profit_margin_percent / 100.0);
        info!(
            "Placing limit SELL for {:.8} {} at price {:.8}",
            settled, request.coin_symbol, sell_price
        );
        let params = self
            .order_params
            .get(&request.exchange)
            .cloned()
            .unwrap_or_default();
        let sell = exchange
            .create_limit_sell_order(&request.coin_symbol, settled, sell_price, &params)
            .await?;
        *phase = TradePhase::SellSubmitted;
        info!("Limit SELL order placed: {}", sell.id);

        *phase = TradePhase::Succeeded;
        Ok(format!(
            "🚀 [LIVE] Trade successful!\n\n\
             Bought & selling: {:.6} {}\n\
             On: {}\n\n\
             Sell order placed at ${:.6}",
            settled,
            base,
            request.exchange.as_str().to_uppercase(),
            sell_price
        ))
    }

    /// Wait for the bought asset's free balance to settle. Polls at a fixed
    /// interval up to a bounded maximum; the first positive free balance is
    /// the sell quantity. This is the only retried step of an attempt.
    async fn poll_settlement(&self, exchange: &dyn Exchange, asset: &str) -> Result<f64> {
        let max_wait = self.settlement.max_wait();
        let interval = self.settlement.poll_interval();
        let started = tokio::time::Instant::now();

        info!(
            "Polling for {} balance to settle (max {}s)...",
            asset, self.settlement.max_wait_secs
        );
        while started.elapsed() < max_wait {
            let balances = exchange.fetch_balance().await?;
            let free = balances.get(asset).map(|b| b.free).unwrap_or(0.0);
            if free > 0.0 {
                info!("Balance settled: {:.8} {} available to sell", free, asset);
                return Ok(free);
            }
            tokio::time::sleep(interval).await;
        }

        Err(AppError::SettlementTimeout {
            asset: asset.to_string(),
            waited_secs: self.settlement.max_wait_secs,
        })
    }
}

#[async_trait]
impl TradeExecutor for LiveTrader {
    async fn execute(&self, request: &TradeRequest) -> TradeOutcome {
        info!(
            "[LIVE] Executing trade on {} for {}",
            request.exchange.as_str().to_uppercase(),
            request.coin_symbol
        );
        let mut phase = TradePhase::Pending;
        match self.try_execute(request, &mut phase).await {
            Ok(message) => TradeOutcome::success(message),
            Err(e) => {
                error!("Trade failed ({phase}): {e}");
                TradeOutcome::failure(format!("❌ [LIVE] Trade failed ({phase}): {e}"))
            }
        }
    }
}

/// Select the executor for the configured mode.
pub fn build_executor(config: &Config) -> Arc<dyn TradeExecutor> {
    match config.mode {
        TradeMode::Simulation => Arc::new(SimulationTrader),
        TradeMode::Live => Arc::new(LiveTrader::from_credentials(
            &config.credentials,
            &config.exchange_priority,
            config.settlement.clone(),
        )),
    }
}

fn default_order_params() -> HashMap<ExchangeId, OrderParams> {
    let mut params = HashMap::new();
    // Bybit routes spot orders by an explicit market category.
    let mut bybit = OrderParams::new();
    bybit.insert("category".to_string(), "spot".to_string());
    params.insert(ExchangeId::Bybit, bybit);
    params
}
