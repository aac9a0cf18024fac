//! In-memory view of the listing and balance snapshots.
//!
//! `refresh()` reloads both tables from SQLite and swaps the snapshot `Arc`
//! only after both loads succeed; a failed refresh leaves the previous
//! snapshot in place for readers.

use crate::error::{AppError, Result};
use crate::services::{BalancesDb, ListingsDb};
use crate::types::MarketSnapshot;
use chrono::Utc;
use std::sync::{Arc, RwLock};
use tracing::debug;

pub struct SnapshotStore {
    listings: Arc<ListingsDb>,
    balances: Arc<BalancesDb>,
    current: RwLock<Arc<MarketSnapshot>>,
}

impl SnapshotStore {
    pub fn new(listings: Arc<ListingsDb>, balances: Arc<BalancesDb>) -> Self {
        Self {
            listings,
            balances,
            current: RwLock::new(Arc::new(MarketSnapshot::empty())),
        }
    }

    /// Reload both tables and swap in the new snapshot atomically.
    /// Returns `(listing_rows, balance_rows)` on success. On failure the
    /// previous snapshot stays visible and the error is reported to the
    /// caller.
    pub fn refresh(&self) -> Result<(usize, usize)> {
        let listings = self
            .listings
            .load()
            .map_err(|e| AppError::Snapshot(format!("failed to load listings: {e}")))?;
        let balances = self
            .balances
            .load()
            .map_err(|e| AppError::Snapshot(format!("failed to load balances: {e}")))?;

        let snapshot = Arc::new(MarketSnapshot::new(listings, balances, Utc::now()));
        let counts = (snapshot.listing_count(), snapshot.balance_count());
        *self.current.write().unwrap() = snapshot;
        debug!(
            "Snapshot refreshed: {} listings, {} balance rows",
            counts.0, counts.1
        );
        Ok(counts)
    }

    /// The current snapshot. Cheap clone of an `Arc`; the returned value
    /// never changes under the caller even if a refresh lands mid-request.
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.current.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceRecord, ListingRecord};

    fn store_with_rows() -> SnapshotStore {
        let listings = Arc::new(ListingsDb::new_in_memory().unwrap());
        let balances = Arc::new(BalancesDb::new_in_memory().unwrap());
        listings
            .replace_all(&[ListingRecord {
                exchange: "bybit".to_string(),
                symbol: "BTC/USDT".to_string(),
            }])
            .unwrap();
        balances
            .replace_all(&[BalanceRecord {
                exchange: "bybit".to_string(),
                total_balance: 200.0,
            }])
            .unwrap();
        SnapshotStore::new(listings, balances)
    }

    #[test]
    fn test_empty_before_first_refresh() {
        let store = store_with_rows();
        assert_eq!(store.snapshot().listing_count(), 0);
        assert_eq!(store.snapshot().balance_count(), 0);
    }

    #[test]
    fn test_refresh_loads_rows() {
        let store = store_with_rows();
        let (listings, balances) = store.refresh().unwrap();
        assert_eq!(listings, 1);
        assert_eq!(balances, 1);
        assert!(store.snapshot().listings_for("BTC/USDT").contains("bybit"));
    }

    #[test]
    fn test_old_snapshot_survives_refresh() {
        let store = store_with_rows();
        store.refresh().unwrap();
        let held = store.snapshot();

        store.listings.replace_all(&[]).unwrap();
        store.refresh().unwrap();

        // The handle taken before the refresh still sees the old data.
        assert_eq!(held.listing_count(), 1);
        assert_eq!(store.snapshot().listing_count(), 0);
    }
}
