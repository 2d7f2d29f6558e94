//! Position Engine Library
//!
//! Reads a user's position in a binary prediction market from chain state,
//! caches it with a per-key refresh cooldown, and prices it against the
//! market's pari-mutuel pool.

pub mod common;
pub mod config;
pub mod engine;
pub mod position;
pub mod pricing;

// Re-export commonly used types
pub use common::clock::{ManualClock, SystemClock};
pub use common::errors::{ChainError, EngineError, Result};
pub use common::traits::{CacheStore, ChainReader, Clock, SubmitReceipt, Submitter};
pub use common::types::{Address, Amount, CacheKey, ChainValue, MarketId, Side, UserId};
pub use config::types::EngineConfig;
pub use engine::{PositionEngine, TradeAction};

// Position types
pub use position::{
    AggregatorSettings, GetOptions, InMemoryCacheStore, JsonFileCacheStore, PoolState,
    PositionAggregator, PositionRead, PositionSnapshot, ReadSource, RefreshDecision,
    RefreshScheduler, RetryPolicy, UserHoldings,
};

// Pricing types
pub use pricing::{
    DerivedPosition, LiquidityWithdrawal, PricingEngine, TradePreview, TradePreviewCalculator,
};
