use solotrader::config::Config;
use solotrader::exchanges::build_client;
use solotrader::scanners::{BalanceScanner, ListingsScanner};
use solotrader::services::{
    build_executor, BalancesDb, CooldownLedger, ListingsDb, SnapshotStore, SystemClock,
    TradeCoordinator,
};
use solotrader::telegram::TelegramChannel;
use solotrader::types::ExchangeId;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solotrader=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; fails fast on missing keys or bad settings
    let config = Arc::new(Config::load("config.json")?);
    info!("Starting solo trader in {} mode", config.mode);

    // Open the snapshot and cooldown databases
    std::fs::create_dir_all(&config.data_dir)?;
    let listings_db = Arc::new(ListingsDb::new(config.data_dir.join("listings.db"))?);
    let balances_db = Arc::new(BalancesDb::new(config.data_dir.join("balance.db"))?);
    let cooldowns = Arc::new(CooldownLedger::new(config.data_dir.join("portfolio.db"))?);
    let snapshots = Arc::new(SnapshotStore::new(listings_db.clone(), balances_db.clone()));

    // Listing endpoints are public; balance scanning needs credentials
    let public_clients: Vec<_> = ExchangeId::ALL
        .iter()
        .map(|id| build_client(*id, None))
        .collect();
    let trading_clients: Vec<_> = ExchangeId::ALL
        .iter()
        .filter_map(|id| {
            config
                .credentials
                .get(id)
                .map(|creds| build_client(*id, Some(creds.clone())))
        })
        .collect();

    let listings_scanner = Arc::new(ListingsScanner::new(
        public_clients,
        listings_db,
        config.scan.listings_interval(),
    ));
    let balance_scanner = Arc::new(BalanceScanner::new(
        trading_clients,
        balances_db,
        config.scan.balance_interval(),
    ));

    // Initial scans so the first request has data to match against
    info!("Running initial snapshot scans");
    if let Err(e) = listings_scanner.scan_once().await {
        error!("Initial listings scan failed: {e}");
    }
    if let Err(e) = balance_scanner.scan_once().await {
        error!("Initial balance scan failed: {e}");
    }
    if let Err(e) = snapshots.refresh() {
        warn!("Initial cache load failed: {e}");
    }

    // Periodic scans run decoupled from request handling
    tokio::spawn({
        let scanner = listings_scanner.clone();
        async move { scanner.start().await }
    });
    tokio::spawn({
        let scanner = balance_scanner.clone();
        async move { scanner.start().await }
    });

    let executor = build_executor(&config);
    let coordinator = Arc::new(TradeCoordinator::new(
        config.clone(),
        snapshots,
        cooldowns,
        executor,
        Arc::new(SystemClock),
    ));

    let channel = TelegramChannel::new(&config.telegram_token, coordinator);
    channel.run().await;

    Ok(())
}
