//! Per-key refresh cooldown
//!
//! Each `(market, user)` key gets a token bucket of one: a refresh is allowed
//! once `cooldown_ms` has passed since the previous attempt was committed, and
//! only if no other refresh for the key is still running. Keys never affect
//! each other.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::clock::elapsed_ms;
use crate::common::traits::Clock;
use crate::common::types::CacheKey;

/// Default minimum interval between refreshes of one key
pub const DEFAULT_COOLDOWN_MS: u64 = 30_000;

/// Refresh bookkeeping for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshGate {
    /// Time of the last committed attempt, successful or not
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub cooldown_ms: u64,
    /// An allowed refresh has not committed yet
    pub in_flight: bool,
}

impl RefreshGate {
    fn new(cooldown_ms: u64) -> Self {
        Self {
            last_refresh_at: None,
            cooldown_ms,
            in_flight: false,
        }
    }

    /// Milliseconds until a refresh would be allowed, `None` if allowed now
    fn retry_after_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.in_flight {
            return Some(self.cooldown_ms);
        }
        let last = self.last_refresh_at?;
        let elapsed = elapsed_ms(last, now);
        (elapsed < self.cooldown_ms).then(|| self.cooldown_ms - elapsed)
    }
}

/// Outcome of [`RefreshScheduler::try_acquire`]
#[derive(Debug)]
pub enum Acquire {
    Allowed(RefreshPermit),
    Denied { retry_after_ms: u64 },
}

struct SchedulerInner {
    gates: Mutex<HashMap<CacheKey, RefreshGate>>,
    clock: Arc<dyn Clock>,
    cooldown_ms: u64,
    allowed: AtomicU64,
    denied: AtomicU64,
}

impl SchedulerInner {
    fn commit(&self, key: &CacheKey, at: DateTime<Utc>) {
        let mut gates = self.gates.lock();
        match gates.get_mut(key) {
            Some(gate) => {
                gate.last_refresh_at = Some(at);
                gate.in_flight = false;
                debug!(%key, at = %at, "refresh committed");
            }
            None => warn!(%key, "commit for a key that was never acquired"),
        }
    }
}

/// Cooldown gate shared by every refresh path of the engine
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

impl RefreshScheduler {
    pub fn new(cooldown_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                gates: Mutex::new(HashMap::new()),
                clock,
                cooldown_ms,
                allowed: AtomicU64::new(0),
                denied: AtomicU64::new(0),
            }),
        }
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.inner.cooldown_ms
    }

    /// Ask to refresh `key` now
    ///
    /// A denial leaves the gate untouched. An allowed refresh marks the key in
    /// flight until the returned permit is committed or dropped.
    pub fn try_acquire(&self, key: &CacheKey) -> Acquire {
        let now = self.inner.clock.now();
        let mut gates = self.inner.gates.lock();

        if let Some(retry_after_ms) = gates.get(key).and_then(|g| g.retry_after_ms(now)) {
            self.inner.denied.fetch_add(1, Ordering::Relaxed);
            debug!(%key, retry_after_ms, "refresh denied by cooldown");
            return Acquire::Denied { retry_after_ms };
        }

        let gate = gates
            .entry(*key)
            .or_insert_with(|| RefreshGate::new(self.inner.cooldown_ms));
        gate.in_flight = true;
        self.inner.allowed.fetch_add(1, Ordering::Relaxed);
        debug!(%key, "refresh allowed");

        Acquire::Allowed(RefreshPermit {
            scheduler: Arc::clone(&self.inner),
            key: *key,
            committed: false,
        })
    }

    /// Record a refresh attempt for `key` at `at`
    ///
    /// Normally reached through [`RefreshPermit::commit`].
    pub fn commit(&self, key: &CacheKey, at: DateTime<Utc>) {
        self.inner.commit(key, at);
    }

    /// Milliseconds until `key` may refresh again, `None` if it may now
    pub fn retry_after_ms(&self, key: &CacheKey) -> Option<u64> {
        let now = self.inner.clock.now();
        self.inner
            .gates
            .lock()
            .get(key)
            .and_then(|g| g.retry_after_ms(now))
    }

    /// Current gate state for `key`
    pub fn gate(&self, key: &CacheKey) -> Option<RefreshGate> {
        self.inner.gates.lock().get(key).copied()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            allowed: self.inner.allowed.load(Ordering::Relaxed),
            denied: self.inner.denied.load(Ordering::Relaxed),
            cooldown_ms: self.inner.cooldown_ms,
            tracked_keys: self.inner.gates.lock().len(),
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("cooldown_ms", &self.inner.cooldown_ms)
            .finish()
    }
}

/// Counters about scheduler usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub allowed: u64,
    pub denied: u64,
    pub cooldown_ms: u64,
    pub tracked_keys: usize,
}

/// Permission to run one refresh
///
/// Must be committed exactly once. Dropping it uncommitted (for example when
/// the caller abandons the refresh) commits at drop time, so an abandoned or
/// failed attempt still consumes the cooldown.
#[must_use = "an allowed refresh must be committed"]
pub struct RefreshPermit {
    scheduler: Arc<SchedulerInner>,
    key: CacheKey,
    committed: bool,
}

impl RefreshPermit {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Commit the attempt at the scheduler clock's current time
    pub fn commit(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.committed {
            self.committed = true;
            let now = self.scheduler.clock.now();
            self.scheduler.commit(&self.key, now);
        }
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        if !self.committed {
            debug!(key = %self.key, "refresh permit dropped before commit");
        }
        self.finish();
    }
}

impl std::fmt::Debug for RefreshPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshPermit")
            .field("key", &self.key)
            .field("committed", &self.committed)
            .finish()
    }
}
