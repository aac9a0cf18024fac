use crate::error::{AppError, Result};
use crate::exchanges::{hmac_sha256_base64, Exchange, ExchangeCredentials, OrderParams};
use crate::types::{AssetBalance, ExchangeId, OrderAck, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const KUCOIN_API_URL: &str = "https://api.kucoin.com";

/// Envelope every kucoin response is wrapped in.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: String,
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Level1Ticker {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccount {
    currency: String,
    #[serde(rename = "type")]
    account_type: String,
    balance: String,
    available: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSymbol {
    base_currency: String,
    quote_currency: String,
    enable_trading: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderData {
    order_id: String,
}

/// KuCoin REST client. The only venue that needs an API passphrase on top
/// of the key/secret pair.
#[derive(Clone)]
pub struct KucoinClient {
    client: Client,
    credentials: Option<ExchangeCredentials>,
}

impl KucoinClient {
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

    /// `BTC/USDT` -> `BTC-USDT`.
    fn pair(symbol: &str) -> String {
        symbol.replace('/', "-")
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
        let envelope: ApiResponse<T> = response.json().await?;
        if envelope.code != "200000" {
            return Err(self.api_error(format!(
                "code {}: {}",
                envelope.code,
                envelope.msg.unwrap_or_default()
            )));
        }
        envelope
            .data
            .ok_or_else(|| self.api_error("empty data".to_string()))
    }

    /// Signed headers for API key version 2: the signature covers
    /// `timestamp + method + path + body`, and the passphrase itself is
    /// HMAC-signed with the secret.
    fn signed_headers(
        &self,
        method: &str,
        path_with_query: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>> {
        let credentials = self.credentials()?;
        let passphrase = credentials.passphrase.as_ref().ok_or_else(|| {
            AppError::Config("KUCOIN_API_PASSPHRASE not set but kucoin credentials are".to_string())
        })?;

        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let to_sign = format!("{}{}{}{}", timestamp, method, path_with_query, body);

        Ok(vec![
            ("KC-API-KEY", credentials.api_key.clone()),
            (
                "KC-API-SIGN",
                hmac_sha256_base64(&credentials.secret_key, &to_sign),
            ),
            ("KC-API-TIMESTAMP", timestamp),
            (
                "KC-API-PASSPHRASE",
                hmac_sha256_base64(&credentials.secret_key, passphrase),
            ),
            ("KC-API-KEY-VERSION", "2".to_string()),
        ])
    }

    async fn signed_get<T: DeserializeOwned>(&self, path_with_query: &str) -> Result<T> {
        let headers = self.signed_headers("GET", path_with_query, "")?;
        let url = format!("{}{}", KUCOIN_API_URL, path_with_query);
        let mut request = self.client.get(&url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        self.parse(request.send().await?).await
    }

    async fn signed_post<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<T> {
        let headers = self.signed_headers("POST", path, &body)?;
        let url = format!("{}{}", KUCOIN_API_URL, path);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        self.parse(request.send().await?).await
    }
}

#[async_trait]
impl Exchange for KucoinClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Kucoin
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let url = format!(
            "{}/api/v1/market/orderbook/level1?symbol={}",
            KUCOIN_API_URL,
            Self::pair(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let ticker: Level1Ticker = self.parse(response).await?;
        debug!("kucoin ticker {} = {}", symbol, ticker.price);

        Ok(Ticker {
            symbol: symbol.to_string(),
            last: ticker.price.parse().unwrap_or(0.0),
        })
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>> {
        let accounts: Vec<RawAccount> = self.signed_get("/api/v1/accounts").await?;

        let mut balances = HashMap::new();
        for raw in accounts {
            // Orders settle into the trade account.
            if raw.account_type != "trade" {
                continue;
            }
            balances.insert(
                raw.currency,
                AssetBalance {
                    free: raw.available.parse().unwrap_or(0.0),
                    total: raw.balance.parse().unwrap_or(0.0),
                },
            );
        }
        Ok(balances)
    }

    async fn fetch_spot_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/v1/symbols", KUCOIN_API_URL);
        let response = self.client.get(&url).send().await?;
        let symbols: Vec<RawSymbol> = self.parse(response).await?;

        Ok(symbols
            .into_iter()
            .filter(|s| s.enable_trading && s.quote_currency == "USDT")
            .map(|s| format!("{}/USDT", s.base_currency))
            .collect())
    }

    async fn create_market_buy_order(&self, symbol: &str, quantity: f64) -> Result<OrderAck> {
        let body = serde_json::json!({
            "clientOid": Uuid::new_v4().to_string(),
            "side": "buy",
            "symbol": Self::pair(symbol),
            "type": "market",
            "size": format!("{:.8}", quantity),
        })
        .to_string();
        let order: OrderData = self.signed_post("/api/v1/orders", body).await?;

        Ok(OrderAck {
            id: order.order_id,
            symbol: symbol.to_string(),
        })
    }

    async fn create_limit_sell_order(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
        _params: &OrderParams,
    ) -> Result<OrderAck> {
        let body = serde_json::json!({
            "clientOid": Uuid::new_v4().to_string(),
            "side": "sell",
            "symbol": Self::pair(symbol),
            "type": "limit",
            "size": format!("{:.8}", quantity),
            "price": format!("{:.8}", price),
        })
        .to_string();
        let order: OrderData = self.signed_post("/api/v1/orders", body).await?;

        Ok(OrderAck {
            id: order.order_id,
            symbol: symbol.to_string(),
        })
    }
}
