//! Position module
//!
//! Reading a user's position out of a market's contracts:
//! - Snapshot types ([`PositionSnapshot`], [`PoolState`], [`UserHoldings`])
//! - Typed decoding of raw contract values
//! - Per-key refresh cooldown ([`RefreshScheduler`])
//! - Bounded retry for transient read failures
//! - Cache stores (in-memory and JSON files)
//! - The aggregator tying them together

pub mod aggregator;
pub mod cache;
pub mod decode;
pub mod retry;
pub mod scheduler;
pub mod snapshot;

pub use aggregator::{
    AggregatorSettings, GetOptions, PositionAggregator, PositionRead, ReadSource,
    RefreshDecision,
};
pub use cache::{InMemoryCacheStore, JsonFileCacheStore};
pub use decode::MarketContracts;
pub use retry::RetryPolicy;
pub use scheduler::{Acquire, RefreshGate, RefreshPermit, RefreshScheduler, SchedulerStats};
pub use snapshot::{PoolState, PositionSnapshot, UserHoldings};
