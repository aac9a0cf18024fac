//! End-to-end request handling over constructed snapshots, a simulation
//! executor, and a fixed clock.

use chrono::{DateTime, Duration, TimeZone, Utc};
use solotrader::config::Config;
use solotrader::services::{
    BalancesDb, Clock, CooldownLedger, ListingsDb, SimulationTrader, SnapshotStore,
    TradeCoordinator,
};
use solotrader::types::{BalanceRecord, ListingRecord};
use std::sync::{Arc, Mutex};

/// Test clock that only moves when told to.
struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn test_config() -> Arc<Config> {
    let json = r#"{
        "mode": "simulation",
        "trade_amount_usdt": 100.0,
        "profit_margin_percent": 2.0,
        "cooldown_period_hours": 24,
        "exchange_priority": ["binance", "bybit"]
    }"#;
    Arc::new(serde_json::from_str(json).unwrap())
}

/// Fixture state: binance holds 50 USDT and lists ETH, bybit holds 200
/// USDT and lists BTC.
fn coordinator() -> (Arc<TradeCoordinator>, Arc<FixedClock>) {
    let listings = Arc::new(ListingsDb::new_in_memory().unwrap());
    let balances = Arc::new(BalancesDb::new_in_memory().unwrap());
    listings
        .replace_all(&[
            ListingRecord {
                exchange: "bybit".to_string(),
                symbol: "BTC/USDT".to_string(),
            },
            ListingRecord {
                exchange: "binance".to_string(),
                symbol: "ETH/USDT".to_string(),
            },
        ])
        .unwrap();
    balances
        .replace_all(&[
            BalanceRecord {
                exchange: "binance".to_string(),
                total_balance: 50.0,
            },
            BalanceRecord {
                exchange: "bybit".to_string(),
                total_balance: 200.0,
            },
        ])
        .unwrap();

    let snapshots = Arc::new(SnapshotStore::new(listings, balances));
    let cooldowns = Arc::new(CooldownLedger::new_in_memory().unwrap());
    let clock = FixedClock::new();

    let coordinator = Arc::new(TradeCoordinator::new(
        test_config(),
        snapshots,
        cooldowns,
        Arc::new(SimulationTrader),
        clock.clone(),
    ));
    (coordinator, clock)
}

#[tokio::test]
async fn test_btc_trades_on_bybit_despite_binance_priority() {
    let (coordinator, _) = coordinator();

    let reply = coordinator.handle_coin_request("BTC").await;
    assert!(reply.contains("SIMULATION"), "got: {reply}");
    assert!(reply.contains("BYBIT"), "got: {reply}");
    assert!(reply.contains("BTC/USDT"));
}

#[tokio::test]
async fn test_eth_reports_no_funded_exchange() {
    let (coordinator, _) = coordinator();

    // binance lists ETH but holds only 50 USDT; bybit is funded but does
    // not list ETH.
    let reply = coordinator.handle_coin_request("ETH").await;
    assert!(reply.contains("No exchange holding at least"), "got: {reply}");
    assert!(reply.contains("bybit"));
    assert!(reply.contains("binance"));
}

#[tokio::test]
async fn test_unknown_coin_reports_not_listed() {
    let (coordinator, _) = coordinator();

    let reply = coordinator.handle_coin_request("DOGE").await;
    assert!(reply.contains("not listed on any tracked exchange"), "got: {reply}");
}

#[tokio::test]
async fn test_successful_trade_starts_cooldown() {
    let (coordinator, _) = coordinator();

    let first = coordinator.handle_coin_request("BTC").await;
    assert!(first.contains("SIMULATION"));

    let second = coordinator.handle_coin_request("BTC").await;
    assert!(second.contains("Cooldown active"), "got: {second}");
    assert!(second.contains("BTC/USDT"));
}

#[tokio::test]
async fn test_cooldown_expires_after_window() {
    let (coordinator, clock) = coordinator();

    coordinator.handle_coin_request("btc").await;
    clock.advance(Duration::hours(24) + Duration::seconds(1));

    let reply = coordinator.handle_coin_request("btc").await;
    assert!(reply.contains("SIMULATION"), "got: {reply}");
}

#[tokio::test]
async fn test_failed_match_does_not_start_cooldown() {
    let (coordinator, _) = coordinator();

    coordinator.handle_coin_request("ETH").await;
    let again = coordinator.handle_coin_request("ETH").await;
    assert!(!again.contains("Cooldown active"), "got: {again}");
}

#[tokio::test]
async fn test_lowercase_input_is_normalized() {
    let (coordinator, _) = coordinator();

    let reply = coordinator.handle_coin_request("  btc ").await;
    assert!(reply.contains("BTC/USDT"), "got: {reply}");
}

#[tokio::test]
async fn test_garbage_input_is_rejected() {
    let (coordinator, _) = coordinator();

    let reply = coordinator.handle_coin_request("not a coin!").await;
    assert!(reply.contains("Unrecognized coin symbol"), "got: {reply}");

    let reply = coordinator.handle_coin_request("").await;
    assert!(reply.contains("Unrecognized coin symbol"));
}

#[tokio::test]
async fn test_progress_notes_emitted_during_request() {
    let (coordinator, _) = coordinator();
    let mut progress = coordinator.subscribe_progress();

    coordinator.handle_coin_request("BTC").await;

    let first = progress.try_recv().unwrap();
    assert!(first.contains("Analyzing BTC"), "got: {first}");
    let second = progress.try_recv().unwrap();
    assert!(second.contains("Opportunity found on BYBIT"), "got: {second}");
}

#[tokio::test]
async fn test_reload_cache_reports_row_counts() {
    let (coordinator, _) = coordinator();

    let reply = coordinator.reload_cache();
    assert!(reply.contains("✅"), "got: {reply}");
    assert!(reply.contains("2 listings"));
    assert!(reply.contains("2 balance rows"));
}

#[tokio::test]
async fn test_online_message_names_mode() {
    let (coordinator, _) = coordinator();
    assert!(coordinator.online_message().contains("simulation"));
}
