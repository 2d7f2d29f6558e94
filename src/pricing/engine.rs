use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::math::{ratio_percent, reserves_with_total, scale_amount};
use crate::common::types::{Amount, Side};
use crate::position::{PoolState, PositionSnapshot, UserHoldings};

/// Financial view of one snapshot
///
/// Recomputed on demand and never cached. Amounts are in token smallest
/// units, percentages are in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedPosition {
    pub direct_yes: Amount,
    pub direct_no: Amount,
    /// Share of the YES reserve attributable to the user's liquidity shares
    pub indirect_yes_via_liquidity: Amount,
    pub indirect_no_via_liquidity: Amount,
    pub total_yes_holdings: Amount,
    pub total_no_holdings: Amount,
    pub liquidity_share_percent: Decimal,
    pub implied_yes_price_percent: Decimal,
    pub implied_no_price_percent: Decimal,
    pub value_yes_in_collateral: Amount,
    pub value_no_in_collateral: Amount,
    pub total_value_in_collateral: Amount,
}

/// Tokens and collateral value released by burning liquidity shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityWithdrawal {
    /// Shares actually valued, capped at the pool's outstanding shares
    pub shares: Amount,
    pub yes_amount: Amount,
    pub no_amount: Amount,
    pub value_in_collateral: Amount,
}

/// Pari-mutuel pricing over a two-sided pool
///
/// Every function is pure: identical inputs always give identical outputs.
pub struct PricingEngine;

impl PricingEngine {
    /// Derive holdings, prices and valuation from a snapshot
    pub fn derive_position(snapshot: &PositionSnapshot) -> DerivedPosition {
        Self::derive(&snapshot.pool, &snapshot.holdings)
    }

    /// Derive holdings, prices and valuation from a pool and a user's balances
    ///
    /// # Arguments
    /// * `pool` - Current reserves and outstanding liquidity shares
    /// * `holdings` - The user's token balances and liquidity shares
    pub fn derive(pool: &PoolState, holdings: &UserHoldings) -> DerivedPosition {
        let total_shares = pool.total_liquidity_shares;
        let shares = holdings.liquidity_shares;

        let indirect_yes = scale_amount(pool.reserve_yes, shares, total_shares);
        let indirect_no = scale_amount(pool.reserve_no, shares, total_shares);

        let total_yes = holdings.yes_balance.saturating_add(indirect_yes);
        let total_no = holdings.no_balance.saturating_add(indirect_no);

        let implied_yes = Self::implied_yes_price_percent(pool);
        let value_yes = Self::collateral_value(pool, Side::Yes, total_yes);
        let value_no = Self::collateral_value(pool, Side::No, total_no);

        DerivedPosition {
            direct_yes: holdings.yes_balance,
            direct_no: holdings.no_balance,
            indirect_yes_via_liquidity: indirect_yes,
            indirect_no_via_liquidity: indirect_no,
            total_yes_holdings: total_yes,
            total_no_holdings: total_no,
            liquidity_share_percent: ratio_percent(shares, total_shares),
            implied_yes_price_percent: implied_yes,
            implied_no_price_percent: dec!(100) - implied_yes,
            value_yes_in_collateral: value_yes,
            value_no_in_collateral: value_no,
            total_value_in_collateral: value_yes.saturating_add(value_no),
        }
    }

    /// Market-implied YES probability, 50 for an empty pool
    pub fn implied_yes_price_percent(pool: &PoolState) -> Decimal {
        let (yes, _, total) = reserves_with_total(pool.reserve_yes, pool.reserve_no);
        if total.is_zero() {
            return dec!(50);
        }
        ratio_percent(yes, total)
    }

    /// Market-implied probability of `side`
    pub fn implied_price_percent(pool: &PoolState, side: Side) -> Decimal {
        let yes = Self::implied_yes_price_percent(pool);
        match side {
            Side::Yes => yes,
            Side::No => dec!(100) - yes,
        }
    }

    /// Collateral value of `amount` tokens of `side` at the implied price
    ///
    /// Equals `amount * price / 100` floored, computed from the reserves
    /// directly so no rounded percentage enters the product. An empty pool
    /// values each side at half.
    pub fn collateral_value(pool: &PoolState, side: Side, amount: Amount) -> Amount {
        let (yes, no, total) = reserves_with_total(pool.reserve_yes, pool.reserve_no);
        if total.is_zero() {
            return Amount::new(amount.raw() / 2);
        }
        let reserve = match side {
            Side::Yes => yes,
            Side::No => no,
        };
        scale_amount(amount, reserve, total)
    }

    /// Value the proportional withdrawal of `shares` liquidity shares
    ///
    /// Shares beyond the pool's outstanding total are capped. A pool with no
    /// outstanding shares releases nothing.
    pub fn liquidity_withdrawal(pool: &PoolState, shares: Amount) -> LiquidityWithdrawal {
        let total_shares = pool.total_liquidity_shares;
        let shares = shares.min(total_shares);

        let yes_amount = scale_amount(pool.reserve_yes, shares, total_shares);
        let no_amount = scale_amount(pool.reserve_no, shares, total_shares);
        let value = Self::collateral_value(pool, Side::Yes, yes_amount)
            .saturating_add(Self::collateral_value(pool, Side::No, no_amount));

        LiquidityWithdrawal {
            shares,
            yes_amount,
            no_amount,
            value_in_collateral: value,
        }
    }

    /// Payout of an existing `stake` on `side` if that side wins
    ///
    /// `stake + stake * opposite_pool / side_pool`, or zero while the side's
    /// pool is empty.
    pub fn potential_winnings(pool: &PoolState, side: Side, stake: Amount) -> Amount {
        let (side_pool, other_pool) = match side {
            Side::Yes => (pool.reserve_yes, pool.reserve_no),
            Side::No => (pool.reserve_no, pool.reserve_yes),
        };
        if side_pool.is_zero() {
            return Amount::ZERO;
        }
        stake.saturating_add(scale_amount(stake, other_pool, side_pool))
    }

    /// Decimal odds (`100 / p`) for a probability in percent
    ///
    /// Returns `None` outside the open interval `(0, 100)`.
    pub fn implied_decimal_odds(probability_percent: Decimal) -> Option<Decimal> {
        if probability_percent <= Decimal::ZERO || probability_percent >= dec!(100) {
            return None;
        }
        dec!(100).checked_div(probability_percent)
    }
}
