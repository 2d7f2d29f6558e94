use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::types::{Amount, CacheKey, MarketId, UserId};

/// Pool backing a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolState {
    pub reserve_yes: Amount,
    pub reserve_no: Amount,
    /// Zero means no liquidity positions exist
    pub total_liquidity_shares: Amount,
}

impl PoolState {
    pub fn new(reserve_yes: Amount, reserve_no: Amount, total_liquidity_shares: Amount) -> Self {
        Self {
            reserve_yes,
            reserve_no,
            total_liquidity_shares,
        }
    }

    /// Pari-mutuel pool with no liquidity shares
    pub fn with_reserves(reserve_yes: impl Into<Amount>, reserve_no: impl Into<Amount>) -> Self {
        Self::new(reserve_yes.into(), reserve_no.into(), Amount::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.reserve_yes.is_zero() && self.reserve_no.is_zero()
    }
}

/// Direct token balances of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserHoldings {
    pub yes_balance: Amount,
    pub no_balance: Amount,
    pub liquidity_shares: Amount,
}

/// One consistent read of a user's position; the unit of caching
///
/// Never mutated after construction: a trade or liquidity action produces a
/// new snapshot through a fresh refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub market_id: MarketId,
    pub user_id: UserId,
    pub pool: PoolState,
    pub holdings: UserHoldings,
    pub observed_at: DateTime<Utc>,
}

impl PositionSnapshot {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.market_id, self.user_id)
    }

    /// Age of the snapshot in milliseconds at `now`
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        crate::common::clock::elapsed_ms(self.observed_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Address;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_json_layout() {
        let snapshot = PositionSnapshot {
            market_id: Address::new([0xaa; 20]),
            user_id: Address::new([0xbb; 20]),
            pool: PoolState::new(Amount::new(100), Amount::new(200), Amount::new(50)),
            holdings: UserHoldings {
                yes_balance: Amount::new(10),
                no_balance: Amount::ZERO,
                liquidity_shares: Amount::new(5),
            },
            observed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["pool"]["reserve_no"], "200");
        assert_eq!(value["holdings"]["liquidity_shares"], "5");
        assert_eq!(value["market_id"], format!("0x{}", "aa".repeat(20)));
        assert_eq!(value["observed_at"], "2026-03-01T12:00:00Z");

        let back: PositionSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_age_ms() {
        let observed = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let snapshot = PositionSnapshot {
            market_id: Address::new([1; 20]),
            user_id: Address::new([2; 20]),
            pool: PoolState::default(),
            holdings: UserHoldings::default(),
            observed_at: observed,
        };
        assert_eq!(snapshot.age_ms(observed + chrono::Duration::seconds(10)), 10_000);
    }
}
