//! Background snapshot collection jobs.
//!
//! Each scanner runs on its own timer, decoupled from request handling, and
//! replaces its snapshot table wholesale per pass. A venue that fails is
//! logged and skipped; the rest of the pass continues.

pub mod balances;
pub mod listings;

pub use balances::BalanceScanner;
pub use listings::ListingsScanner;
