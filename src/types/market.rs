use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Exchange identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Kucoin,
    Mexc,
}

impl ExchangeId {
    /// Every venue the assistant knows how to talk to.
    pub const ALL: &'static [ExchangeId] = &[
        ExchangeId::Binance,
        ExchangeId::Bybit,
        ExchangeId::Kucoin,
        ExchangeId::Mexc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Kucoin => "kucoin",
            ExchangeId::Mexc => "mexc",
        }
    }

    /// Prefix used for this venue's credential environment variables.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "BINANCE",
            ExchangeId::Bybit => "BYBIT",
            ExchangeId::Kucoin => "KUCOIN",
            ExchangeId::Mexc => "MEXC",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single `(exchange, symbol)` row from the listings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub exchange: String,
    /// Unified trading-pair form, e.g. `BTC/USDT`.
    pub symbol: String,
}

/// One exchange's total USDT balance from the balances snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub exchange: String,
    pub total_balance: f64,
}

/// Last-trade ticker for a trading pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub last: f64,
}

/// Free/total balance for a single asset on one venue.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AssetBalance {
    /// Amount available for new orders.
    pub free: f64,
    /// Free plus locked.
    pub total: f64,
}

/// Acknowledgement returned by order placement.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub id: String,
    pub symbol: String,
}

/// Immutable point-in-time view of the listings and balances tables.
///
/// Built once per refresh and swapped in wholesale; readers never observe a
/// partially loaded state.
#[derive(Debug)]
pub struct MarketSnapshot {
    /// Symbol -> exchanges that list it.
    listings: HashMap<String, BTreeSet<String>>,
    /// Exchange -> total USDT balance.
    balances: BTreeMap<String, f64>,
    listing_rows: usize,
    pub loaded_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(
        listings: Vec<ListingRecord>,
        balances: Vec<BalanceRecord>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        let listing_rows = listings.len();
        let mut by_symbol: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in listings {
            by_symbol.entry(row.symbol).or_default().insert(row.exchange);
        }
        // Latest snapshot wins: one row per exchange.
        let balances = balances
            .into_iter()
            .map(|row| (row.exchange, row.total_balance))
            .collect();

        Self {
            listings: by_symbol,
            balances,
            listing_rows,
            loaded_at,
        }
    }

    /// Empty snapshot used before the first refresh.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Utc::now())
    }

    /// Exchanges that list the given unified symbol.
    pub fn listings_for(&self, symbol: &str) -> BTreeSet<String> {
        self.listings.get(symbol).cloned().unwrap_or_default()
    }

    /// Exchanges whose total balance is at least `threshold`.
    pub fn balances_at_least(&self, threshold: f64) -> BTreeSet<String> {
        self.balances
            .iter()
            .filter(|(_, balance)| **balance >= threshold)
            .map(|(exchange, _)| exchange.clone())
            .collect()
    }

    pub fn listing_count(&self) -> usize {
        self.listing_rows
    }

    pub fn balance_count(&self) -> usize {
        self.balances.len()
    }
}
