//! Per-coin cooldown ledger.
//!
//! A single `portfolio(coin PRIMARY KEY, buy_timestamp)` table records the
//! last successful trade per coin. The clock is always supplied by the
//! caller, which keeps lockout decisions deterministic under test.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Injected time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// SQLite-backed cooldown ledger.
pub struct CooldownLedger {
    conn: Mutex<Connection>,
}

impl CooldownLedger {
    /// Open (or create) the portfolio database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        info!("Cooldown ledger initialized");
        Ok(ledger)
    }

    /// In-memory ledger for testing.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS portfolio (
                coin TEXT PRIMARY KEY,
                buy_timestamp TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Whether `coin` is still inside its cooldown window at `now`.
    /// Returns the unlock time while locked. A coin with no entry is never
    /// locked; entries older than the window expire logically and are left
    /// in place.
    pub fn is_locked(
        &self,
        coin: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let stored: Option<String> = conn
            .query_row(
                "SELECT buy_timestamp FROM portfolio WHERE coin = ?1",
                params![coin],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        let last_trade = match DateTime::parse_from_rfc3339(&stored) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!("Discarding malformed cooldown timestamp for {coin}: {e}");
                return Ok(None);
            }
        };

        let unlock_time = last_trade + window;
        if now < unlock_time {
            Ok(Some(unlock_time))
        } else {
            Ok(None)
        }
    }

    /// Record a successful trade at `now`. Upsert; last write wins.
    pub fn record_trade(&self, coin: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "REPLACE INTO portfolio (coin, buy_timestamp) VALUES (?1, ?2)",
            params![coin, now.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unknown_coin_is_never_locked() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        let locked = ledger
            .is_locked("BTC/USDT", fixed_time(), Duration::hours(24))
            .unwrap();
        assert_eq!(locked, None);
    }

    #[test]
    fn test_record_then_check_round_trip() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        let trade_time = fixed_time();
        ledger.record_trade("BTC/USDT", trade_time).unwrap();

        let locked = ledger
            .is_locked("BTC/USDT", trade_time, Duration::hours(24))
            .unwrap();
        assert_eq!(locked, Some(trade_time + Duration::hours(24)));
    }

    #[test]
    fn test_locked_just_before_window_elapses() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        let trade_time = fixed_time();
        ledger.record_trade("BTC/USDT", trade_time).unwrap();

        let almost = trade_time + Duration::hours(24) - Duration::seconds(1);
        assert!(ledger
            .is_locked("BTC/USDT", almost, Duration::hours(24))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_unlocked_after_window_elapses() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        let trade_time = fixed_time();
        ledger.record_trade("BTC/USDT", trade_time).unwrap();

        let after = trade_time + Duration::hours(24) + Duration::seconds(1);
        assert!(ledger
            .is_locked("BTC/USDT", after, Duration::hours(24))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_upsert_moves_timestamp_forward() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        let first = fixed_time();
        let second = first + Duration::hours(30);
        ledger.record_trade("BTC/USDT", first).unwrap();
        ledger.record_trade("BTC/USDT", second).unwrap();

        let locked = ledger
            .is_locked("BTC/USDT", second, Duration::hours(24))
            .unwrap();
        assert_eq!(locked, Some(second + Duration::hours(24)));
    }

    #[test]
    fn test_coins_are_independent() {
        let ledger = CooldownLedger::new_in_memory().unwrap();
        ledger.record_trade("BTC/USDT", fixed_time()).unwrap();

        assert!(ledger
            .is_locked("ETH/USDT", fixed_time(), Duration::hours(24))
            .unwrap()
            .is_none());
    }
}
