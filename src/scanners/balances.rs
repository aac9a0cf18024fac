use crate::error::Result;
use crate::exchanges::Exchange;
use crate::services::BalancesDb;
use crate::types::BalanceRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Collects each venue's total USDT balance into the balances snapshot.
pub struct BalanceScanner {
    exchanges: Vec<Arc<dyn Exchange>>,
    db: Arc<BalancesDb>,
    interval: Duration,
}

impl BalanceScanner {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>, db: Arc<BalancesDb>, interval: Duration) -> Self {
        Self {
            exchanges,
            db,
            interval,
        }
    }

    /// Scan on a fixed timer. Callers run `scan_once` first for an initial
    /// snapshot; this loop waits out one interval before its first pass.
    pub async fn start(&self) {
        info!("Starting balance scanner ({}s interval)", self.interval.as_secs());
        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.scan_once().await {
                error!("Balance scan failed: {e}");
            }
        }
    }

    /// One full pass over every venue. Returns the number of rows written.
    pub async fn scan_once(&self) -> Result<usize> {
        info!("--- Starting balance scan ---");
        let mut rows = Vec::new();
        for exchange in &self.exchanges {
            match exchange.fetch_balance().await {
                Ok(balances) => {
                    let usdt = balances.get("USDT").map(|b| b.total).unwrap_or(0.0);
                    info!("Fetched balance for {}: {:.2} USDT", exchange.id(), usdt);
                    rows.push(BalanceRecord {
                        exchange: exchange.id().to_string(),
                        total_balance: usdt,
                    });
                }
                Err(e) => error!("Could not fetch balance from {}: {e}", exchange.id()),
            }
        }
        self.db.replace_all(&rows)?;
        info!("--- Balance scan finished ({} exchanges) ---", rows.len());
        Ok(rows.len())
    }
}
