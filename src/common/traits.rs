//! Capabilities the engine consumes but never implements itself

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::errors::{ChainError, Result};
use super::types::{CacheKey, ChainValue, ContractId};
use crate::position::PositionSnapshot;

/// Read-only access to contract state
///
/// Implementations wrap an RPC transport. Calls may be slow and may fail
/// transiently; the engine converts every failure into its own taxonomy.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Read a named field (or view function) of a contract
    ///
    /// # Arguments
    /// * `contract` - Contract to call
    /// * `field` - Field or view function name, e.g. `poolState`
    /// * `args` - Call arguments in declaration order
    async fn read(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> std::result::Result<ChainValue, ChainError>;
}

/// Receipt returned once a submitted call settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub confirmed: bool,
}

/// State-changing calls, signed and sent by the wallet layer
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Send a call and wait for it to be mined
    async fn submit(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> std::result::Result<SubmitReceipt, ChainError>;
}

/// Durable key/value store for position snapshots
///
/// Stores hold one snapshot per key and never expire entries themselves;
/// staleness policy belongs to the aggregator.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<PositionSnapshot>>;

    async fn set(&self, key: &CacheKey, snapshot: &PositionSnapshot) -> Result<()>;
}

/// Source of time for cooldowns, staleness and retry backoff
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
