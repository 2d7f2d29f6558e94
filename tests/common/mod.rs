//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use position_engine::common::types::ContractId;
use position_engine::{
    Address, Amount, CacheKey, CacheStore, ChainError, ChainReader, ChainValue, EngineConfig,
    EngineError, ManualClock, PoolState, PositionEngine, PositionSnapshot, SubmitReceipt,
    Submitter, UserHoldings,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One collateral unit at 6 decimals
pub const M: u128 = 1_000_000;

pub fn market() -> Address {
    Address::new([0x4d; 20])
}

pub fn user() -> Address {
    Address::new([0x75; 20])
}

pub fn yes_token() -> Address {
    Address::new([0xa1; 20])
}

pub fn no_token() -> Address {
    Address::new([0xb2; 20])
}

pub fn collateral() -> Address {
    Address::new([0xcc; 20])
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}

/// Contract state served by [`ScriptedReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    pub pool: PoolState,
    pub holdings: UserHoldings,
}

/// 40/60 pool with 100 liquidity shares, user holding 5 YES and 25 shares
pub fn sample_state() -> ChainState {
    ChainState {
        pool: PoolState::new(Amount::new(40 * M), Amount::new(60 * M), Amount::new(100)),
        holdings: UserHoldings {
            yes_balance: Amount::new(5 * M),
            no_balance: Amount::ZERO,
            liquidity_shares: Amount::new(25),
        },
    }
}

/// Snapshot of `state` for the fixture market and user
pub fn snapshot_at(state: ChainState, observed_at: DateTime<Utc>) -> PositionSnapshot {
    PositionSnapshot {
        market_id: market(),
        user_id: user(),
        pool: state.pool,
        holdings: state.holdings,
        observed_at,
    }
}

/// In-memory stand-in for the market, YES token and NO token contracts
///
/// Reads can be failed globally or per field, and held at a gate until the
/// test releases them.
pub struct ScriptedReader {
    state: Mutex<ChainState>,
    fail_all: Mutex<Option<ChainError>>,
    fail_field: Mutex<HashMap<String, ChainError>>,
    flaky: Mutex<HashMap<String, (ChainError, usize)>>,
    reads: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    allowance: Mutex<Amount>,
}

impl ScriptedReader {
    pub fn new(state: ChainState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            fail_all: Mutex::new(None),
            fail_field: Mutex::new(HashMap::new()),
            flaky: Mutex::new(HashMap::new()),
            reads: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            allowance: Mutex::new(Amount::ZERO),
        })
    }

    pub fn set_state(&self, state: ChainState) {
        *self.state.lock() = state;
    }

    /// Collateral the user has approved for the market
    pub fn approve(&self, amount: Amount) {
        *self.allowance.lock() = amount;
    }

    /// Fail every read with `err`
    pub fn fail_with(&self, err: ChainError) {
        *self.fail_all.lock() = Some(err);
    }

    /// Fail reads of one field with `err`
    pub fn fail_field(&self, field: &str, err: ChainError) {
        self.fail_field.lock().insert(field.to_string(), err);
    }

    /// Fail the next `times` reads of one field with `err`
    pub fn flaky_field(&self, field: &str, err: ChainError, times: usize) {
        self.flaky.lock().insert(field.to_string(), (err, times));
    }

    pub fn recover(&self) {
        *self.fail_all.lock() = None;
        self.fail_field.lock().clear();
        self.flaky.lock().clear();
    }

    /// Block reads until [`ScriptedReader::release`]
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().len()
    }

    pub fn reads_of(&self, field: &str) -> usize {
        self.reads.lock().iter().filter(|f| f.as_str() == field).count()
    }

    fn answer(&self, contract: &ContractId, field: &str) -> Result<ChainValue, ChainError> {
        let state = *self.state.lock();
        let uint = |amount: Amount| ChainValue::Uint(amount);

        match (field, *contract) {
            ("marketParams", c) if c == market() => Ok(ChainValue::Tuple(vec![
                uint(Amount::new(1_780_000_000)),
                uint(Amount::new(1_790_000_000)),
                ChainValue::Address(yes_token()),
                ChainValue::Address(no_token()),
            ])),
            ("balanceOf", c) if c == yes_token() => Ok(uint(state.holdings.yes_balance)),
            ("balanceOf", c) if c == no_token() => Ok(uint(state.holdings.no_balance)),
            ("liquidityPositions", c) if c == market() => Ok(uint(state.holdings.liquidity_shares)),
            ("poolState", c) if c == market() => Ok(ChainValue::Tuple(vec![
                uint(state.pool.reserve_yes),
                uint(state.pool.reserve_no),
                uint(Amount::ZERO),
                uint(Amount::ZERO),
                uint(Amount::ZERO),
            ])),
            ("totalLiquidityShares", c) if c == market() => {
                Ok(uint(state.pool.total_liquidity_shares))
            }
            ("allowance", c) if c == collateral() => Ok(uint(*self.allowance.lock())),
            (field, contract) => Err(ChainError::Reverted(format!(
                "{} has no function {}",
                contract, field
            ))),
        }
    }
}

#[async_trait]
impl ChainReader for ScriptedReader {
    async fn read(
        &self,
        contract: &ContractId,
        field: &str,
        _args: &[ChainValue],
    ) -> Result<ChainValue, ChainError> {
        self.reads.lock().push(field.to_string());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ChainError::Unavailable(e.to_string()))?;
        }

        if let Some(err) = self.fail_all.lock().clone() {
            return Err(err);
        }
        if let Some(err) = self.fail_field.lock().get(field).cloned() {
            return Err(err);
        }
        if let Some((err, remaining)) = self.flaky.lock().get_mut(field) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(err.clone());
            }
        }
        self.answer(contract, field)
    }
}

/// Submitter that records calls and answers with a fixed receipt
pub struct RecordingSubmitter {
    pub confirmed: bool,
    pub calls: Mutex<Vec<(Address, String, Vec<ChainValue>)>>,
}

impl RecordingSubmitter {
    pub fn new(confirmed: bool) -> Arc<Self> {
        Arc::new(Self {
            confirmed,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> Result<SubmitReceipt, ChainError> {
        self.calls
            .lock()
            .push((*contract, field.to_string(), args.to_vec()));
        Ok(SubmitReceipt {
            confirmed: self.confirmed,
        })
    }
}

/// Store whose every call fails
pub struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<PositionSnapshot>, EngineError> {
        Err(EngineError::Cache("disk unreadable".into()))
    }

    async fn set(&self, _key: &CacheKey, _snapshot: &PositionSnapshot) -> Result<(), EngineError> {
        Err(EngineError::Cache("disk full".into()))
    }
}

/// Engine over the given collaborators with default configuration
pub fn engine(
    reader: Arc<ScriptedReader>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<ManualClock>,
) -> PositionEngine {
    engine_with(EngineConfig::default(), reader, cache, clock)
}

pub fn engine_with(
    config: EngineConfig,
    reader: Arc<ScriptedReader>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<ManualClock>,
) -> PositionEngine {
    PositionEngine::from_config(&config, reader, cache, clock)
}
