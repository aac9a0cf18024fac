use crate::types::ExchangeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which trade executor handles requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    /// Report the trade that would have been placed; no exchange I/O.
    Simulation,
    /// Place real orders.
    Live,
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeMode::Simulation => write!(f, "simulation"),
            TradeMode::Live => write!(f, "live"),
        }
    }
}

/// One trade attempt handed to the executor. Built by the coordinator,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    /// Unified trading-pair symbol, e.g. `BTC/USDT`.
    pub coin_symbol: String,
    pub exchange: ExchangeId,
    pub amount_usdt: f64,
    pub profit_margin_percent: f64,
}

impl TradeRequest {
    /// The asset being bought (`BTC` in `BTC/USDT`).
    pub fn base_currency(&self) -> &str {
        self.coin_symbol
            .split('/')
            .next()
            .unwrap_or(&self.coin_symbol)
    }
}

/// Result reported by an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub success: bool,
    pub message: String,
}

impl TradeOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Phase a live trade attempt is in; used for logging and failure context.
///
/// Failure is reachable from any phase. The only retried phase is the
/// settlement poll itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradePhase {
    Pending,
    PriceFetched,
    BuySubmitted,
    PollingSettlement,
    SettlementTimedOut,
    SellSubmitted,
    Succeeded,
}

impl fmt::Display for TradePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradePhase::Pending => "pending",
            TradePhase::PriceFetched => "price fetched",
            TradePhase::BuySubmitted => "buy submitted",
            TradePhase::PollingSettlement => "polling settlement",
            TradePhase::SettlementTimedOut => "settlement timed out",
            TradePhase::SellSubmitted => "sell submitted",
            TradePhase::Succeeded => "succeeded",
        };
        write!(f, "{}", name)
    }
}
