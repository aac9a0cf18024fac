//! Solo Trader - single-operator Telegram trading assistant
//!
//! The operator posts a coin symbol into a Telegram chat; the bot matches it
//! against cached exchange listing and balance snapshots, picks one exchange
//! by configured priority, executes (or simulates) a buy-then-sell trade,
//! and enforces a per-coin cooldown.

pub mod config;
pub mod error;
pub mod exchanges;
pub mod scanners;
pub mod services;
pub mod telegram;
pub mod types;

pub use error::{AppError, Result};
