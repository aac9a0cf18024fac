use crate::error::{AppError, Result};
use crate::exchanges::{hmac_sha256_hex, Exchange, ExchangeCredentials, OrderParams};
use crate::types::{AssetBalance, ExchangeId, OrderAck, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const MEXC_API_URL: &str = "https://api.mexc.com/api/v3";

/// MEXC mirrors the binance v3 surface closely; the signing scheme is the
/// same query-string HMAC, only the auth header differs.
#[derive(Debug, Deserialize)]
struct PriceTicker {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    base_asset: String,
    quote_asset: String,
    #[serde(default = "default_trading_allowed")]
    is_spot_trading_allowed: bool,
}

fn default_trading_allowed() -> bool {
    true
}

/// MEXC spot REST client.
#[derive(Clone)]
pub struct MexcClient {
    client: Client,
    credentials: Option<ExchangeCredentials>,
}

impl MexcClient {
    pub fn new(credentials: Option<ExchangeCredentials>) -> Self {
        let client = Client::builder()
            .user_agent("solotrader/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            credentials,
        }
    }

    /// `BTC/USDT` -> `BTCUSDT`.
    fn pair(symbol: &str) -> String {
        symbol.replace('/', "")
    }

    fn credentials(&self) -> Result<&ExchangeCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| AppError::MissingCredentials {
                exchange: self.id().to_string(),
            })
    }

    fn api_error(&self, detail: String) -> AppError {
        AppError::ExchangeApi {
            exchange: self.id().to_string(),
            detail,
        }
    }

    async fn parse<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(self.api_error(format!("{}: {}", status, &text[..text.len().min(200)])));
        }
        Ok(response.json().await?)
    }

    fn sign_query(&self, query: &str) -> Result<String> {
        let credentials = self.credentials()?;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let payload = if query.is_empty() {
            format!("timestamp={}", timestamp)
        } else {
            format!("{}&timestamp={}", query, timestamp)
        };
        let signature = hmac_sha256_hex(&credentials.secret_key, &payload);
        Ok(format!("{}&signature={}", payload, signature))
    }

    async fn signed_get<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let signed = self.sign_query(query)?;
        let url = format!("{}{}?{}", MEXC_API_URL, path, signed);
        let response = self
            .client
            .get(&url)
            .header("X-MEXC-APIKEY", &self.credentials()?.api_key)
            .send()
            .await?;
        self.parse(response).await
    }

    async fn signed_post<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let signed = self.sign_query(query)?;
        let url = format!("{}{}?{}", MEXC_API_URL, path, signed);
        let response = self
            .client
            .post(&url)
            .header("X-MEXC-APIKEY", &self.credentials()?.api_key)
            .send()
            .await?;
        self.parse(response).await
    }
}

#[async_trait]
impl Exchange for MexcClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let url = format!("{}/ticker/price?symbol={}", MEXC_API_URL, Self::pair(symbol));
        let response = self.client.get(&url).send().await?;
        let ticker: PriceTicker = self.parse(response).await?;
        debug!("mexc ticker {} = {}", ticker.symbol, ticker.price);

        Ok(Ticker {
            symbol: symbol.to_string(),
            last: ticker.price.parse().unwrap_or(0.0),
        })
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>> {
        let account: AccountInfo = self.signed_get("/account", "").await?;

        let mut balances = HashMap::new();
        for raw in account.balances {
            let free: f64 = raw.free.parse().unwrap_or(0.0);
            let locked: f64 = raw.locked.parse().unwrap_or(0.0);
            balances.insert(
                raw.asset,
                AssetBalance {
                    free,
                    total: free + locked,
                },
            );
        }
        Ok(balances)
    }

    async fn fetch_spot_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/exchangeInfo", MEXC_API_URL);
        let response = self.client.get(&url).send().await?;
        let info: ExchangeInfo = self.parse(response).await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.is_spot_trading_allowed && s.quote_asset == "USDT")
            .map(|s| format!("{}/USDT", s.base_asset))
            .collect())
    }

    async fn create_market_buy_order(&self, symbol: &str, quantity: f64) -> Result<OrderAck> {
        let query = format!(
            "symbol={}&side=BUY&type=MARKET&quantity={:.8}",
            Self::pair(symbol),
            quantity
        );
        let order: OrderResponse = self.signed_post("/order", &query).await?;

        Ok(OrderAck {
            id: order.order_id,
            symbol: order.symbol,
        })
    }

    async fn create_limit_sell_order(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
        _params: &OrderParams,
    ) -> Result<OrderAck> {
        let query = format!(
            "symbol={}&side=SELL&type=LIMIT&quantity={:.8}&price={:.8}",
            Self::pair(symbol),
            quantity,
            price
        );
        let order: OrderResponse = self.signed_post("/order", &query).await?;

        Ok(OrderAck {
            id: order.order_id,
            symbol: order.symbol,
        })
    }
}
