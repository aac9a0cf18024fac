use crate::error::Result;
use crate::exchanges::Exchange;
use crate::services::ListingsDb;
use crate::types::ListingRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Collects every venue's USDT spot pairs into the listings snapshot.
/// Listing endpoints are public, so this scanner works without credentials.
pub struct ListingsScanner {
    exchanges: Vec<Arc<dyn Exchange>>,
    db: Arc<ListingsDb>,
    interval: Duration,
}

impl ListingsScanner {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>, db: Arc<ListingsDb>, interval: Duration) -> Self {
        Self {
            exchanges,
            db,
            interval,
        }
    }

    /// Scan on a fixed timer. Callers run `scan_once` first for an initial
    /// snapshot; this loop waits out one interval before its first pass.
    pub async fn start(&self) {
        info!(
            "Starting listings scanner ({}s interval)",
            self.interval.as_secs()
        );
        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.scan_once().await {
                error!("Listings scan failed: {e}");
            }
        }
    }

    /// One full pass over every venue. Returns the number of rows written.
    pub async fn scan_once(&self) -> Result<usize> {
        info!("--- Starting listings scan ---");
        let mut rows = Vec::new();
        for exchange in &self.exchanges {
            match exchange.fetch_spot_symbols().await {
                Ok(symbols) => {
                    info!("Stored {} pairs from {}", symbols.len(), exchange.id());
                    rows.extend(symbols.into_iter().map(|symbol| ListingRecord {
                        exchange: exchange.id().to_string(),
                        symbol,
                    }));
                }
                Err(e) => error!("Could not fetch listings from {}: {e}", exchange.id()),
            }
        }
        self.db.replace_all(&rows)?;
        info!("--- Listings scan finished ({} rows) ---", rows.len());
        Ok(rows.len())
    }
}
