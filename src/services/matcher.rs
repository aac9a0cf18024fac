//! Cache-backed opportunity matching.
//!
//! Pure set arithmetic over the current snapshot: intersect the exchanges
//! funded above the trade size with those listing the symbol, then break the
//! tie with the operator's priority order. No I/O, no side effects;
//! identical inputs always yield the identical decision.

use crate::types::{ExchangeId, MarketSnapshot};
use std::collections::BTreeSet;
use thiserror::Error;

/// Why no trade happens for a symbol. Each variant carries the sets it was
/// computed from so the operator can see what the bot saw.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("❓ {symbol} is not listed on any tracked exchange (exchanges with balance: {funded:?})")]
    NotListed {
        symbol: String,
        funded: BTreeSet<String>,
    },

    #[error(
        "⚠️ No exchange holding at least {min_amount} USDT lists {symbol}.\n\
         Balance on: {funded:?}\nListed on: {listed:?}"
    )]
    NotFunded {
        symbol: String,
        min_amount: f64,
        funded: BTreeSet<String>,
        listed: BTreeSet<String>,
    },

    #[error(
        "❌ No trade opportunity for {symbol}: it is not listed on any tracked \
         exchange and no exchange holds at least {min_amount} USDT"
    )]
    NothingTracked { symbol: String, min_amount: f64 },

    #[error(
        "Logic error: priority order {priority:?} covers none of the eligible \
         exchanges {candidates:?}"
    )]
    PriorityMismatch {
        candidates: BTreeSet<String>,
        priority: Vec<ExchangeId>,
    },
}

/// Normalize operator input to its unified trading-pair form
/// (`btc` -> `BTC/USDT`).
pub fn normalize_symbol(coin: &str) -> String {
    format!("{}/USDT", coin.trim().to_uppercase())
}

/// Pick the exchange to trade `symbol` on, or explain why none qualifies.
pub fn find_opportunity(
    snapshot: &MarketSnapshot,
    symbol: &str,
    min_amount: f64,
    priority: &[ExchangeId],
) -> Result<ExchangeId, MatchError> {
    let funded = snapshot.balances_at_least(min_amount);
    let listed = snapshot.listings_for(symbol);

    if listed.is_empty() && funded.is_empty() {
        return Err(MatchError::NothingTracked {
            symbol: symbol.to_string(),
            min_amount,
        });
    }
    if listed.is_empty() {
        return Err(MatchError::NotListed {
            symbol: symbol.to_string(),
            funded,
        });
    }

    let candidates: BTreeSet<String> = listed.intersection(&funded).cloned().collect();
    if candidates.is_empty() {
        return Err(MatchError::NotFunded {
            symbol: symbol.to_string(),
            min_amount,
            funded,
            listed,
        });
    }

    match priority
        .iter()
        .find(|exchange| candidates.contains(exchange.as_str()))
    {
        Some(exchange) => Ok(*exchange),
        None => Err(MatchError::PriorityMismatch {
            candidates,
            priority: priority.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceRecord, ListingRecord};
    use chrono::Utc;

    fn listing(exchange: &str, symbol: &str) -> ListingRecord {
        ListingRecord {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
        }
    }

    fn balance(exchange: &str, total: f64) -> BalanceRecord {
        BalanceRecord {
            exchange: exchange.to_string(),
            total_balance: total,
        }
    }

    fn snapshot(listings: Vec<ListingRecord>, balances: Vec<BalanceRecord>) -> MarketSnapshot {
        MarketSnapshot::new(listings, balances, Utc::now())
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("btc"), "BTC/USDT");
        assert_eq!(normalize_symbol("  Doge "), "DOGE/USDT");
    }

    #[test]
    fn test_priority_tie_break_is_deterministic() {
        let snapshot = snapshot(
            vec![listing("bybit", "BTC/USDT"), listing("mexc", "BTC/USDT")],
            vec![balance("bybit", 500.0), balance("mexc", 500.0)],
        );
        let priority = [
            ExchangeId::Binance,
            ExchangeId::Mexc,
            ExchangeId::Bybit,
            ExchangeId::Kucoin,
        ];

        let chosen = find_opportunity(&snapshot, "BTC/USDT", 100.0, &priority).unwrap();
        assert_eq!(chosen, ExchangeId::Mexc);
    }

    #[test]
    fn test_identical_inputs_identical_decision() {
        let snapshot = snapshot(
            vec![listing("bybit", "BTC/USDT"), listing("mexc", "BTC/USDT")],
            vec![balance("bybit", 500.0), balance("mexc", 500.0)],
        );
        let priority = [ExchangeId::Mexc, ExchangeId::Bybit];

        let first = find_opportunity(&snapshot, "BTC/USDT", 100.0, &priority);
        let second = find_opportunity(&snapshot, "BTC/USDT", 100.0, &priority);
        assert_eq!(first, second);
    }

    #[test]
    fn test_not_listed_reason() {
        let snapshot = snapshot(
            vec![listing("binance", "ETH/USDT")],
            vec![balance("binance", 500.0)],
        );

        let err = find_opportunity(
            &snapshot,
            "DOGE/USDT",
            100.0,
            &[ExchangeId::Binance],
        )
        .unwrap_err();
        match err {
            MatchError::NotListed { symbol, funded } => {
                assert_eq!(symbol, "DOGE/USDT");
                assert!(funded.contains("binance"));
            }
            other => panic!("expected NotListed, got {other:?}"),
        }
    }

    #[test]
    fn test_not_funded_reason_with_disjoint_sets() {
        // ETH is listed on binance only, but only bybit is funded.
        let snapshot = snapshot(
            vec![
                listing("bybit", "BTC/USDT"),
                listing("binance", "ETH/USDT"),
            ],
            vec![balance("binance", 50.0), balance("bybit", 200.0)],
        );

        let err = find_opportunity(
            &snapshot,
            "ETH/USDT",
            100.0,
            &[ExchangeId::Binance, ExchangeId::Bybit],
        )
        .unwrap_err();
        match err {
            MatchError::NotFunded {
                funded, listed, ..
            } => {
                assert!(funded.contains("bybit"));
                assert!(listed.contains("binance"));
            }
            other => panic!("expected NotFunded, got {other:?}"),
        }
    }

    #[test]
    fn test_not_funded_reason_with_empty_funded_set() {
        let snapshot = snapshot(
            vec![listing("binance", "ETH/USDT")],
            vec![balance("binance", 10.0)],
        );

        let err =
            find_opportunity(&snapshot, "ETH/USDT", 100.0, &[ExchangeId::Binance]).unwrap_err();
        assert!(matches!(err, MatchError::NotFunded { .. }));
    }

    #[test]
    fn test_nothing_tracked_reason() {
        let snapshot = snapshot(Vec::new(), Vec::new());

        let err =
            find_opportunity(&snapshot, "BTC/USDT", 100.0, &[ExchangeId::Binance]).unwrap_err();
        assert!(matches!(err, MatchError::NothingTracked { .. }));
    }

    #[test]
    fn test_priority_mismatch_is_an_error() {
        let snapshot = snapshot(
            vec![listing("mexc", "BTC/USDT")],
            vec![balance("mexc", 500.0)],
        );

        // mexc qualifies but is absent from the priority list.
        let err = find_opportunity(
            &snapshot,
            "BTC/USDT",
            100.0,
            &[ExchangeId::Binance, ExchangeId::Bybit],
        )
        .unwrap_err();
        match err {
            MatchError::PriorityMismatch { candidates, .. } => {
                assert!(candidates.contains("mexc"));
            }
            other => panic!("expected PriorityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_priority_skips_unlisted_exchange() {
        // binance outranks bybit but lacks the BTC listing.
        let snapshot = snapshot(
            vec![
                listing("bybit", "BTC/USDT"),
                listing("binance", "ETH/USDT"),
            ],
            vec![balance("binance", 50.0), balance("bybit", 200.0)],
        );

        let chosen = find_opportunity(
            &snapshot,
            "BTC/USDT",
            100.0,
            &[ExchangeId::Binance, ExchangeId::Bybit],
        )
        .unwrap();
        assert_eq!(chosen, ExchangeId::Bybit);
    }
}
