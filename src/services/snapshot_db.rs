//! SQLite persistence for the listings and balances snapshots.
//!
//! The scanners replace each table wholesale inside a transaction, so a
//! reader loading mid-scan sees either the previous complete snapshot or the
//! new one, never a partial mix.

use crate::error::Result;
use crate::types::{BalanceRecord, ListingRecord};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Store for the `listings(exchange, symbol)` snapshot table.
pub struct ListingsDb {
    conn: Mutex<Connection>,
}

impl ListingsDb {
    /// Open (or create) the listings database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!("Listings database initialized");
        Ok(db)
    }

    /// In-memory database for testing.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS listings (
                exchange TEXT NOT NULL,
                symbol TEXT NOT NULL,
                PRIMARY KEY (exchange, symbol)
            )",
            [],
        )?;
        Ok(())
    }

    /// Replace the whole table with the given rows.
    pub fn replace_all(&self, rows: &[ListingRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM listings", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO listings (exchange, symbol) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.exchange, row.symbol])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load every listing row.
    pub fn load(&self) -> Result<Vec<ListingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT exchange, symbol FROM listings")?;
        let rows = stmt.query_map([], |row| {
            Ok(ListingRecord {
                exchange: row.get(0)?,
                symbol: row.get(1)?,
            })
        })?;
        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }
}

/// Store for the `balances(exchange, balance)` snapshot table.
pub struct BalancesDb {
    conn: Mutex<Connection>,
}

impl BalancesDb {
    /// Open (or create) the balances database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!("Balances database initialized");
        Ok(db)
    }

    /// In-memory database for testing.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                exchange TEXT PRIMARY KEY,
                balance REAL NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Replace the whole table with the given rows.
    pub fn replace_all(&self, rows: &[BalanceRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM balances", [])?;
        {
            let mut stmt =
                tx.prepare("REPLACE INTO balances (exchange, balance) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.exchange, row.total_balance])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load every balance row.
    pub fn load(&self) -> Result<Vec<BalanceRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT exchange, balance FROM balances")?;
        let rows = stmt.query_map([], |row| {
            Ok(BalanceRecord {
                exchange: row.get(0)?,
                total_balance: row.get(1)?,
            })
        })?;
        let mut balances = Vec::new();
        for row in rows {
            balances.push(row?);
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(exchange: &str, symbol: &str) -> ListingRecord {
        ListingRecord {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
        }
    }

    #[test]
    fn test_listings_round_trip() {
        let db = ListingsDb::new_in_memory().unwrap();
        db.replace_all(&[
            listing("binance", "ETH/USDT"),
            listing("bybit", "BTC/USDT"),
        ])
        .unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&listing("bybit", "BTC/USDT")));
    }

    #[test]
    fn test_listings_replace_is_wholesale() {
        let db = ListingsDb::new_in_memory().unwrap();
        db.replace_all(&[listing("binance", "ETH/USDT")]).unwrap();
        db.replace_all(&[listing("mexc", "DOGE/USDT")]).unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows, vec![listing("mexc", "DOGE/USDT")]);
    }

    #[test]
    fn test_listings_duplicates_collapse() {
        let db = ListingsDb::new_in_memory().unwrap();
        db.replace_all(&[
            listing("binance", "ETH/USDT"),
            listing("binance", "ETH/USDT"),
        ])
        .unwrap();

        assert_eq!(db.load().unwrap().len(), 1);
    }

    #[test]
    fn test_balances_round_trip() {
        let db = BalancesDb::new_in_memory().unwrap();
        db.replace_all(&[
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

        let rows = db.load().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_balances_one_row_per_exchange() {
        let db = BalancesDb::new_in_memory().unwrap();
        db.replace_all(&[
            BalanceRecord {
                exchange: "binance".to_string(),
                total_balance: 50.0,
            },
            BalanceRecord {
                exchange: "binance".to_string(),
                total_balance: 75.0,
            },
        ])
        .unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_balance, 75.0);
    }
}
