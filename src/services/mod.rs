pub mod cooldown;
pub mod coordinator;
pub mod executor;
pub mod matcher;
pub mod snapshot_db;
pub mod snapshot_store;

pub use cooldown::{Clock, CooldownLedger, SystemClock};
pub use coordinator::TradeCoordinator;
pub use executor::{build_executor, LiveTrader, SimulationTrader, TradeExecutor};
pub use matcher::{find_opportunity, normalize_symbol, MatchError};
pub use snapshot_db::{BalancesDb, ListingsDb};
pub use snapshot_store::SnapshotStore;
