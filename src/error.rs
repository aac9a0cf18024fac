use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("API credentials for {exchange} not found")]
    MissingCredentials { exchange: String },

    #[error("snapshot unavailable: {0}")]
    Snapshot(String),

    #[error("current price for {symbol} on {exchange} is zero or unavailable")]
    PriceUnavailable { exchange: String, symbol: String },

    #[error(
        "balance for {asset} did not settle within {waited_secs}s; \
         the market BUY was executed but NO sell order was placed"
    )]
    SettlementTimeout { asset: String, waited_secs: u64 },

    #[error("{exchange} API error: {detail}")]
    ExchangeApi { exchange: String, detail: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
