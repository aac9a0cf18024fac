use crate::error::{AppError, Result};
use crate::exchanges::{hmac_sha256_hex, Exchange, ExchangeCredentials, OrderParams};
use crate::types::{AssetBalance, ExchangeId, OrderAck, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const BYBIT_API_URL: &str = "https://api.bybit.com";
const RECV_WINDOW: &str = "5000";

/// Envelope every bybit v5 response is wrapped in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TickerList {
    list: Vec<RawTicker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: String,
}

#[derive(Debug, Deserialize)]
struct WalletList {
    list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
struct WalletAccount {
    coin: Vec<RawCoinBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCoinBalance {
    coin: String,
    wallet_balance: String,
    #[serde(default)]
    available_to_withdraw: String,
}

#[derive(Debug, Deserialize)]
struct InstrumentList {
    list: Vec<RawInstrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstrument {
    base_coin: String,
    quote_coin: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_id: String,
}

/// Bybit v5 REST client.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    credentials: Option<ExchangeCredentials>,
}

impl BybitClient {
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

    /// Unwrap the v5 envelope; a non-zero `retCode` is an API error.
    async fn parse<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(self.api_error(format!("{}: {}", status, &text[..text.len().min(200)])));
        }
        let envelope: ApiResponse<T> = response.json().await?;
        if envelope.ret_code != 0 {
            return Err(self.api_error(format!(
                "retCode {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }
        envelope
            .result
            .ok_or_else(|| self.api_error("empty result".to_string()))
    }

    /// v5 signature: HMAC over `timestamp + api_key + recv_window + payload`
    /// where payload is the query string (GET) or raw body (POST).
    fn sign(&self, timestamp: i64, payload: &str) -> Result<String> {
        let credentials = self.credentials()?;
        let to_sign = format!(
            "{}{}{}{}",
            timestamp, credentials.api_key, RECV_WINDOW, payload
        );
        Ok(hmac_sha256_hex(&credentials.secret_key, &to_sign))
    }

    async fn signed_get<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, query)?;
        let url = format!("{}{}?{}", BYBIT_API_URL, path, query);
        let response = self
            .client
            .get(&url)
            .header("X-BAPI-API-KEY", &self.credentials()?.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .send()
            .await?;
        self.parse(response).await
    }

    async fn signed_post<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<T> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, &body)?;
        let url = format!("{}{}", BYBIT_API_URL, path);
        let response = self
            .client
            .post(&url)
            .header("X-BAPI-API-KEY", &self.credentials()?.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        self.parse(response).await
    }

    fn category(params: &OrderParams) -> String {
        params
            .get("category")
            .cloned()
            .unwrap_or_else(|| "spot".to_string())
    }
}

#[async_trait]
impl Exchange for BybitClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let url = format!(
            "{}/v5/market/tickers?category=spot&symbol={}",
            BYBIT_API_URL,
            Self::pair(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let tickers: TickerList = self.parse(response).await?;
        let last = tickers
            .list
            .first()
            .map(|t| t.last_price.parse().unwrap_or(0.0))
            .unwrap_or(0.0);
        debug!("bybit ticker {} = {}", symbol, last);

        Ok(Ticker {
            symbol: symbol.to_string(),
            last,
        })
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>> {
        let wallets: WalletList = self
            .signed_get("/v5/account/wallet-balance", "accountType=UNIFIED")
            .await?;

        let mut balances = HashMap::new();
        for account in wallets.list {
            for raw in account.coin {
                let total: f64 = raw.wallet_balance.parse().unwrap_or(0.0);
                let free: f64 = raw.available_to_withdraw.parse().unwrap_or(total);
                balances.insert(raw.coin, AssetBalance { free, total });
            }
        }
        Ok(balances)
    }

    async fn fetch_spot_symbols(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/v5/market/instruments-info?category=spot&limit=1000",
            BYBIT_API_URL
        );
        let response = self.client.get(&url).send().await?;
        let instruments: InstrumentList = self.parse(response).await?;

        Ok(instruments
            .list
            .into_iter()
            .filter(|i| i.status == "Trading" && i.quote_coin == "USDT")
            .map(|i| format!("{}/USDT", i.base_coin))
            .collect())
    }

    async fn create_market_buy_order(&self, symbol: &str, quantity: f64) -> Result<OrderAck> {
        let body = serde_json::json!({
            "category": "spot",
            "symbol": Self::pair(symbol),
            "side": "Buy",
            "orderType": "Market",
            "qty": format!("{:.8}", quantity),
            "marketUnit": "baseCoin",
            "orderLinkId": Uuid::new_v4().to_string(),
        })
        .to_string();
        let order: OrderResult = self.signed_post("/v5/order/create", body).await?;

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
        params: &OrderParams,
    ) -> Result<OrderAck> {
        let body = serde_json::json!({
            "category": Self::category(params),
            "symbol": Self::pair(symbol),
            "side": "Sell",
            "orderType": "Limit",
            "qty": format!("{:.8}", quantity),
            "price": format!("{:.8}", price),
            "timeInForce": "GTC",
            "orderLinkId": Uuid::new_v4().to_string(),
        })
        .to_string();
        let order: OrderResult = self.signed_post("/v5/order/create", body).await?;

        Ok(OrderAck {
            id: order.order_id,
            symbol: symbol.to_string(),
        })
    }
}
