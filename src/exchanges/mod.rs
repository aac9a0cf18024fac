//! Per-venue REST trading clients behind a single `Exchange` trait.
//!
//! Every client speaks the venue's native spot API but presents unified
//! symbols (`BTC/USDT`) and types at the trait boundary. Venue-specific
//! order quirks (bybit's `category`) are passed through an options map at
//! call time rather than modeled as subtypes.

pub mod binance;
pub mod bybit;
pub mod kucoin;
pub mod mexc;

pub use binance::BinanceClient;
pub use bybit::BybitClient;
pub use kucoin::KucoinClient;
pub use mexc::MexcClient;

use crate::error::Result;
use crate::types::{AssetBalance, ExchangeId, OrderAck, Ticker};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::warn;

/// API credentials for one venue.
#[derive(Debug, Clone)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub secret_key: String,
    /// Required by kucoin only.
    pub passphrase: Option<String>,
}

/// Read credentials for every known venue from the environment
/// (`<EXCHANGE>_API_KEY` / `<EXCHANGE>_SECRET_KEY`, plus
/// `KUCOIN_API_PASSPHRASE`). Venues with incomplete credentials are skipped
/// with a warning; the rest of the system keeps running without them.
pub fn credentials_from_env() -> HashMap<ExchangeId, ExchangeCredentials> {
    let mut credentials = HashMap::new();
    for id in ExchangeId::ALL {
        let api_key = env::var(format!("{}_API_KEY", id.env_prefix())).ok();
        let secret_key = env::var(format!("{}_SECRET_KEY", id.env_prefix())).ok();
        match (api_key, secret_key) {
            (Some(api_key), Some(secret_key)) => {
                credentials.insert(
                    *id,
                    ExchangeCredentials {
                        api_key,
                        secret_key,
                        passphrase: env::var(format!("{}_API_PASSPHRASE", id.env_prefix())).ok(),
                    },
                );
            }
            _ => warn!("API keys for {} not found, skipping", id),
        }
    }
    credentials
}

/// Extra venue-specific parameters applied at order placement.
pub type OrderParams = HashMap<String, String>;

/// Spot trading capability of a single venue.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Venue identity.
    fn id(&self) -> ExchangeId;

    /// Last-trade price for a unified symbol.
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker>;

    /// Free/total balances per asset.
    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>>;

    /// All tradable spot pairs quoted in USDT, in unified form.
    async fn fetch_spot_symbols(&self) -> Result<Vec<String>>;

    /// Market buy of `quantity` base units.
    async fn create_market_buy_order(&self, symbol: &str, quantity: f64) -> Result<OrderAck>;

    /// Limit sell of `quantity` base units at `price`.
    async fn create_limit_sell_order(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
        params: &OrderParams,
    ) -> Result<OrderAck>;
}

/// Build the REST client for a venue. Clients without credentials can still
/// serve public endpoints (tickers, listings).
pub fn build_client(
    id: ExchangeId,
    credentials: Option<ExchangeCredentials>,
) -> Arc<dyn Exchange> {
    match id {
        ExchangeId::Binance => Arc::new(BinanceClient::new(credentials)),
        ExchangeId::Bybit => Arc::new(BybitClient::new(credentials)),
        ExchangeId::Kucoin => Arc::new(KucoinClient::new(credentials)),
        ExchangeId::Mexc => Arc::new(MexcClient::new(credentials)),
    }
}

/// HMAC-SHA256 over `payload`, hex encoded (binance/bybit/mexc signatures).
pub(crate) fn hmac_sha256_hex(secret: &str, payload: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 over `payload`, base64 encoded (kucoin signatures).
pub(crate) fn hmac_sha256_base64(secret: &str, payload: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}
