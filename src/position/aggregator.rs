//! Position aggregation
//!
//! Builds one [`PositionSnapshot`] from five concurrent contract reads, gated
//! by the [`RefreshScheduler`] and backed by a [`CacheStore`].
//!
//! ```text
//! get_position(force = false)
//!     │ cached, younger than staleness bound, not invalidated ──► Cache
//!     ▼
//! refresh already in flight for key? ──► await the same shared refresh
//!     ▼
//! scheduler.try_acquire
//!     │ Denied ──► cached ? StaleRateLimited : Err(RateLimited)
//!     ▼ Allowed
//! try_join5(yes balance, no balance, liquidity shares, poolState, total shares)
//!     │ Ok  ──► cache.set, commit ──► Live
//!     │ Err ──► commit ──► cached ? StaleAfterFailure : Err(AggregationFailed)
//! ```

use futures_util::future::{self, BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::decode::{
    decode_amount, decode_market_contracts, decode_reserves, MarketContracts, BALANCE_OF,
    LIQUIDITY_POSITIONS, MARKET_PARAMS, POOL_STATE, TOTAL_LIQUIDITY_SHARES,
};
use super::retry::RetryPolicy;
use super::scheduler::{Acquire, RefreshPermit, RefreshScheduler};
use super::snapshot::{PoolState, PositionSnapshot, UserHoldings};
use crate::common::errors::{ChainError, EngineError, Result};
use crate::common::traits::{CacheStore, ChainReader, Clock};
use crate::common::types::{Amount, CacheKey, ChainValue, ContractId, MarketId, UserId};

/// Default age after which a cached snapshot triggers a refresh attempt
pub const DEFAULT_STALENESS_BOUND_MS: u64 = 3_600_000;

/// Default per-read timeout
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Tunables for [`PositionAggregator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Cached snapshots younger than this are served without refreshing
    pub staleness_bound_ms: u64,
    /// Timeout applied to each contract read, 0 disables it
    pub read_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            staleness_bound_ms: DEFAULT_STALENESS_BOUND_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Options for [`PositionAggregator::get_position`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Skip the staleness check and attempt a refresh
    pub force_refresh: bool,
}

impl GetOptions {
    pub fn forced() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

/// Why the caller is seeing a particular snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadSource {
    /// Read from the chain during this call (or a coalesced concurrent one)
    Live,
    /// Served from cache within the staleness bound
    Cache,
    /// Refresh denied by the cooldown; cached data served instead
    StaleRateLimited { retry_after_ms: u64 },
    /// Refresh attempted but a read failed; cached data served instead
    StaleAfterFailure { cause: ChainError },
}

/// Snapshot returned by [`PositionAggregator::get_position`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRead {
    pub snapshot: PositionSnapshot,
    pub source: ReadSource,
}

impl PositionRead {
    /// Whether a refresh was wanted but could not produce fresh data
    pub fn is_stale(&self) -> bool {
        matches!(
            self.source,
            ReadSource::StaleRateLimited { .. } | ReadSource::StaleAfterFailure { .. }
        )
    }
}

/// Outcome of an explicit refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Allowed,
    Denied { retry_after_ms: u64 },
}

type RefreshFuture = BoxFuture<'static, Result<PositionRead>>;

struct AggregatorInner {
    reader: Arc<dyn ChainReader>,
    cache: Arc<dyn CacheStore>,
    scheduler: RefreshScheduler,
    clock: Arc<dyn Clock>,
    settings: AggregatorSettings,
    /// Token addresses per market; immutable once deployed
    contracts: Mutex<HashMap<MarketId, MarketContracts>>,
    /// Refreshes currently running, held weakly so abandoned ones drop
    in_flight: Mutex<HashMap<CacheKey, WeakShared<RefreshFuture>>>,
    /// Keys whose cached snapshot predates a confirmed trade
    invalidated: Mutex<HashSet<CacheKey>>,
}

/// Either join a running refresh or the reason none could start
enum RefreshStart {
    Running(Shared<RefreshFuture>),
    Denied { retry_after_ms: u64 },
}

/// Owner of the snapshot cache write path
#[derive(Clone)]
pub struct PositionAggregator {
    inner: Arc<AggregatorInner>,
}

impl PositionAggregator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        cache: Arc<dyn CacheStore>,
        scheduler: RefreshScheduler,
        clock: Arc<dyn Clock>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                reader,
                cache,
                scheduler,
                clock,
                settings,
                contracts: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                invalidated: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.inner.scheduler
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.inner.settings
    }

    /// Current position of `user` in `market`
    ///
    /// Never surfaces raw chain errors: failures fall back to the cache and
    /// only become [`EngineError::RateLimited`] or
    /// [`EngineError::AggregationFailed`] when nothing is cached.
    #[instrument(skip_all, fields(market = %market, user = %user))]
    pub async fn get_position(
        &self,
        market: MarketId,
        user: UserId,
        opts: GetOptions,
    ) -> Result<PositionRead> {
        let key = CacheKey::new(market, user);

        if !opts.force_refresh {
            if let Some(snapshot) = self.inner.cached(&key).await {
                if self.inner.is_fresh(&snapshot) {
                    let age_ms = snapshot.age_ms(self.inner.clock.now());
                    debug!("Serving cached position ({} ms old)", age_ms);
                    return Ok(PositionRead {
                        snapshot,
                        source: ReadSource::Cache,
                    });
                }
            }
        }

        match self.start_refresh(key) {
            RefreshStart::Running(refresh) => refresh.await,
            RefreshStart::Denied { retry_after_ms } => match self.inner.cached(&key).await {
                Some(snapshot) => {
                    info!("Refresh rate limited, serving cached position");
                    Ok(PositionRead {
                        snapshot,
                        source: ReadSource::StaleRateLimited { retry_after_ms },
                    })
                }
                None => Err(EngineError::RateLimited { retry_after_ms }),
            },
        }
    }

    /// Refresh now if the cooldown allows it
    ///
    /// An allowed refresh runs to completion before returning; a failed one
    /// still reports `Allowed` because the attempt consumed the cooldown. A
    /// refresh already running for the key reports `Denied`.
    #[instrument(skip_all, fields(market = %market, user = %user))]
    pub async fn refresh_position(&self, market: MarketId, user: UserId) -> RefreshDecision {
        let key = CacheKey::new(market, user);

        if self.inner.running(&key).is_some() {
            return RefreshDecision::Denied {
                retry_after_ms: self.inner.scheduler.cooldown_ms(),
            };
        }

        match self.start_refresh(key) {
            RefreshStart::Running(refresh) => {
                if let Err(e) = refresh.await {
                    warn!("Manual refresh failed: {}", e);
                }
                RefreshDecision::Allowed
            }
            RefreshStart::Denied { retry_after_ms } => {
                info!("Position refresh blocked for {} ms", retry_after_ms);
                RefreshDecision::Denied { retry_after_ms }
            }
        }
    }

    /// Mark the cached snapshot of a key as outdated
    ///
    /// The snapshot stays available as a fallback, but the next non-forced
    /// read attempts a refresh instead of serving it.
    pub fn invalidate(&self, market: MarketId, user: UserId) {
        let key = CacheKey::new(market, user);
        debug!(%key, "cached position invalidated");
        self.inner.invalidated.lock().insert(key);
    }

    /// One contract read under the configured timeout and retry policy
    ///
    /// Bypasses the cache and the refresh cooldown.
    pub async fn read_value(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> std::result::Result<ChainValue, ChainError> {
        self.inner.read(contract, field, args).await
    }

    /// Cached snapshot for a key, without refreshing
    pub async fn cached(&self, market: MarketId, user: UserId) -> Option<PositionSnapshot> {
        self.inner.cached(&CacheKey::new(market, user)).await
    }

    fn start_refresh(&self, key: CacheKey) -> RefreshStart {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(running) = in_flight.get(&key).and_then(WeakShared::upgrade) {
            debug!(%key, "joining in-flight refresh");
            return RefreshStart::Running(running);
        }

        let permit = match self.inner.scheduler.try_acquire(&key) {
            Acquire::Allowed(permit) => permit,
            Acquire::Denied { retry_after_ms } => return RefreshStart::Denied { retry_after_ms },
        };

        let inner = Arc::clone(&self.inner);
        let refresh: RefreshFuture = async move {
            let result = inner.refresh(key, permit).await;
            inner.in_flight.lock().remove(&key);
            result
        }
        .boxed();
        let refresh = refresh.shared();

        if let Some(weak) = refresh.downgrade() {
            in_flight.insert(key, weak);
        }
        RefreshStart::Running(refresh)
    }
}

impl std::fmt::Debug for PositionAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionAggregator")
            .field("settings", &self.inner.settings)
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}

impl AggregatorInner {
    fn running(&self, key: &CacheKey) -> Option<Shared<RefreshFuture>> {
        self.in_flight.lock().get(key).and_then(WeakShared::upgrade)
    }

    fn is_fresh(&self, snapshot: &PositionSnapshot) -> bool {
        !self.invalidated.lock().contains(&snapshot.key())
            && snapshot.age_ms(self.clock.now()) < self.settings.staleness_bound_ms
    }

    /// Cache lookup that degrades store failures to a miss
    async fn cached(&self, key: &CacheKey) -> Option<PositionSnapshot> {
        match self.cache.get(key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%key, "Ignoring unreadable cached position: {}", e);
                None
            }
        }
    }

    async fn refresh(&self, key: CacheKey, permit: RefreshPermit) -> Result<PositionRead> {
        let outcome = self.read_snapshot(&key).await;
        match outcome {
            Ok(snapshot) => {
                if let Err(e) = self.cache.set(&key, &snapshot).await {
                    warn!(%key, "Failed to cache position: {}", e);
                }
                self.invalidated.lock().remove(&key);
                permit.commit();
                info!(%key, "Position refreshed from chain");
                Ok(PositionRead {
                    snapshot,
                    source: ReadSource::Live,
                })
            }
            Err(cause) => {
                permit.commit();
                warn!(%key, "Position refresh failed: {}", cause);
                match self.cached(&key).await {
                    Some(snapshot) => Ok(PositionRead {
                        snapshot,
                        source: ReadSource::StaleAfterFailure { cause },
                    }),
                    None => Err(EngineError::AggregationFailed(cause)),
                }
            }
        }
    }

    /// All five reads must succeed; any failure discards the others
    async fn read_snapshot(
        &self,
        key: &CacheKey,
    ) -> std::result::Result<PositionSnapshot, ChainError> {
        let contracts = self.contracts_for(key.market).await?;
        let user = [ChainValue::Address(key.user)];

        let (yes_balance, no_balance, liquidity_shares, (reserve_yes, reserve_no), total_shares) =
            future::try_join5(
                self.read_amount(&contracts.yes_token, BALANCE_OF, &user),
                self.read_amount(&contracts.no_token, BALANCE_OF, &user),
                self.read_amount(&contracts.market, LIQUIDITY_POSITIONS, &user),
                async {
                    let value = self.read(&contracts.market, POOL_STATE, &[]).await?;
                    decode_reserves(&value)
                },
                self.read_amount(&contracts.market, TOTAL_LIQUIDITY_SHARES, &[]),
            )
            .await?;

        Ok(PositionSnapshot {
            market_id: key.market,
            user_id: key.user,
            pool: PoolState::new(reserve_yes, reserve_no, total_shares),
            holdings: UserHoldings {
                yes_balance,
                no_balance,
                liquidity_shares,
            },
            observed_at: self.clock.now(),
        })
    }

    async fn contracts_for(
        &self,
        market: MarketId,
    ) -> std::result::Result<MarketContracts, ChainError> {
        if let Some(contracts) = self.contracts.lock().get(&market).copied() {
            return Ok(contracts);
        }

        let params = self.read(&market, MARKET_PARAMS, &[]).await?;
        let contracts = decode_market_contracts(market, &params)?;
        debug!(
            %market,
            yes_token = %contracts.yes_token,
            no_token = %contracts.no_token,
            "resolved market tokens"
        );
        self.contracts.lock().insert(market, contracts);
        Ok(contracts)
    }

    async fn read_amount(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> std::result::Result<Amount, ChainError> {
        let value = self.read(contract, field, args).await?;
        decode_amount(&value)
    }

    /// One contract read with timeout and retry
    ///
    /// The timeout runs on tokio's timer, not the injected clock; backoff
    /// between attempts goes through the clock.
    async fn read(
        &self,
        contract: &ContractId,
        field: &str,
        args: &[ChainValue],
    ) -> std::result::Result<ChainValue, ChainError> {
        let timeout_ms = self.settings.read_timeout_ms;
        let reader = &self.reader;

        self.settings
            .retry
            .run(self.clock.as_ref(), field, || async move {
                let call = reader.read(contract, field, args);
                if timeout_ms == 0 {
                    return call.await;
                }
                match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
                    Ok(result) => result,
                    Err(_) => Err(ChainError::Timeout(format!(
                        "{}.{} exceeded {} ms",
                        contract, field, timeout_ms
                    ))),
                }
            })
            .await
    }
}
