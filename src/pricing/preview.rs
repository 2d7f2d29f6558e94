use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::engine::PricingEngine;
use super::math::{parts_with_total, ratio_percent, scale_amount};
use crate::common::types::{Amount, Side};
use crate::position::PoolState;

/// Quote for a prospective bet
///
/// Probabilities are always the YES probability, whichever side is bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePreview {
    pub side: Side,
    pub proposed_amount: Amount,
    pub current_probability_percent: Decimal,
    /// Movement in the bettor's favor is positive
    pub price_impact_percent: Decimal,
    pub new_probability_percent: Decimal,
    /// Collateral returned if `side` wins, stake included
    pub expected_payout: Amount,
}

/// Trade preview utilities
///
/// Previews are estimates for display. They never fail: inputs that cannot
/// be priced produce a preview with no impact and the stake as payout.
pub struct TradePreviewCalculator;

impl TradePreviewCalculator {
    /// Preview a bet of `amount` on `side`
    ///
    /// # Arguments
    /// * `pool` - Current reserves
    /// * `side` - Side being bet
    /// * `amount` - Stake in collateral smallest units
    pub fn preview(pool: &PoolState, side: Side, amount: Amount) -> TradePreview {
        let current = PricingEngine::implied_yes_price_percent(pool);

        if amount.is_zero() || pool.is_empty() {
            return TradePreview {
                side,
                proposed_amount: amount,
                current_probability_percent: current,
                price_impact_percent: Decimal::ZERO,
                new_probability_percent: current,
                expected_payout: amount,
            };
        }

        let ([yes, no, stake], total_after) =
            parts_with_total([pool.reserve_yes, pool.reserve_no, amount]);

        let (new, impact) = match side {
            Side::Yes => {
                let new = ratio_percent(yes.saturating_add(stake), total_after);
                (new, new - current)
            }
            Side::No => {
                let new = ratio_percent(yes, total_after);
                (new, current - new)
            }
        };

        TradePreview {
            side,
            proposed_amount: amount,
            current_probability_percent: current,
            price_impact_percent: impact,
            new_probability_percent: new,
            expected_payout: Self::expected_payout(pool, side, amount),
        }
    }

    /// Preview from user-typed collateral text
    ///
    /// `text` is in whole collateral units (e.g. `"12.5"` USDC) and is scaled
    /// by `decimals`. Empty, negative or unparseable text counts as zero.
    pub fn preview_input(pool: &PoolState, side: Side, text: &str, decimals: u32) -> TradePreview {
        Self::preview(pool, side, Self::parse_amount(text, decimals))
    }

    /// Parse collateral text into smallest units, zero when unusable
    pub fn parse_amount(text: &str, decimals: u32) -> Amount {
        let value = match Decimal::from_str(text.trim()) {
            Ok(value) if value.is_sign_positive() => value,
            _ => return Amount::ZERO,
        };
        Amount::from_units(value, decimals).unwrap_or(Amount::ZERO)
    }

    /// Stake plus the stake's pro-rata claim on the opposite pool
    fn expected_payout(pool: &PoolState, side: Side, amount: Amount) -> Amount {
        let (side_pool, other_pool) = match side {
            Side::Yes => (pool.reserve_yes, pool.reserve_no),
            Side::No => (pool.reserve_no, pool.reserve_yes),
        };
        if side_pool.is_zero() {
            return amount;
        }
        let ([other_pool, side_pool, stake], _) =
            parts_with_total([other_pool, side_pool, amount]);
        let winnings = scale_amount(amount, other_pool, side_pool.saturating_add(stake));
        amount.saturating_add(winnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const M: u128 = 1_000_000;

    fn pool(yes: u128, no: u128) -> PoolState {
        PoolState::with_reserves(yes, no)
    }

    #[test]
    fn test_yes_bet_preview() {
        let preview =
            TradePreviewCalculator::preview(&pool(40 * M, 60 * M), Side::Yes, Amount::new(10 * M));

        assert_eq!(preview.current_probability_percent, dec!(40));
        assert_eq!(preview.new_probability_percent.round_dp(2), dec!(45.45));
        assert_eq!(preview.price_impact_percent.round_dp(2), dec!(5.45));
        assert_eq!(preview.expected_payout, Amount::new(22 * M));
    }

    #[test]
    fn test_no_bet_preview() {
        let preview =
            TradePreviewCalculator::preview(&pool(40 * M, 60 * M), Side::No, Amount::new(10 * M));

        // YES share falls to 40 / 110
        assert_eq!(preview.new_probability_percent.round_dp(2), dec!(36.36));
        assert_eq!(preview.price_impact_percent.round_dp(2), dec!(3.64));
        assert!(preview.price_impact_percent > Decimal::ZERO);
        // 10 + floor(10 * 40 / 70)
        assert_eq!(preview.expected_payout, Amount::new(15_714_285));
    }

    #[test]
    fn test_zero_amount_is_degenerate() {
        let preview =
            TradePreviewCalculator::preview(&pool(40 * M, 60 * M), Side::Yes, Amount::ZERO);
        assert_eq!(preview.price_impact_percent, Decimal::ZERO);
        assert_eq!(preview.new_probability_percent, dec!(40));
        assert_eq!(preview.expected_payout, Amount::ZERO);
    }

    #[test]
    fn test_empty_pool_is_degenerate() {
        let preview = TradePreviewCalculator::preview(&pool(0, 0), Side::No, Amount::new(5 * M));
        assert_eq!(preview.current_probability_percent, dec!(50));
        assert_eq!(preview.new_probability_percent, dec!(50));
        assert_eq!(preview.expected_payout, Amount::new(5 * M));
    }

    #[test]
    fn test_empty_side_pays_stake() {
        let preview = TradePreviewCalculator::preview(&pool(0, 60 * M), Side::Yes, Amount::new(M));
        assert_eq!(preview.expected_payout, Amount::new(M));
        assert_eq!(preview.new_probability_percent.round_dp(4), dec!(1.6393));
    }

    #[test]
    fn test_payout_strictly_increases_with_amount() {
        let p = pool(40 * M, 60 * M);
        for side in [Side::Yes, Side::No] {
            let mut previous = Amount::ZERO;
            for amount in [1, 2, 10, 1_000, M, 10 * M, 100 * M, 10_000 * M] {
                let payout =
                    TradePreviewCalculator::preview(&p, side, Amount::new(amount)).expected_payout;
                assert!(payout > previous, "{} payout did not grow at {}", side, amount);
                previous = payout;
            }
        }
    }

    #[test]
    fn test_over_range_pool_keeps_ratio() {
        let p = pool(u128::MAX / 3, u128::MAX / 3);
        let stake = Amount::new(u128::MAX / 2);
        let preview = TradePreviewCalculator::preview(&p, Side::Yes, stake);

        // (1/3 + 1/2) / (2/3 + 1/2) = 5/7
        assert_eq!(preview.current_probability_percent, dec!(50));
        assert_eq!(preview.new_probability_percent.round_dp(2), dec!(71.43));
        assert_eq!(preview.price_impact_percent.round_dp(2), dec!(21.43));

        let no_bet = TradePreviewCalculator::preview(&p, Side::No, stake);
        // 1/3 / (2/3 + 1/2) = 2/7
        assert_eq!(no_bet.new_probability_percent.round_dp(2), dec!(28.57));
        // stake plus (1/3) / (1/3 + 1/2) of it
        assert!(no_bet.expected_payout > stake);
    }

    #[test]
    fn test_preview_input_parsing() {
        let p = pool(40 * M, 60 * M);
        assert_eq!(
            TradePreviewCalculator::preview_input(&p, Side::Yes, " 10 ", 6).expected_payout,
            Amount::new(22 * M)
        );
        assert_eq!(TradePreviewCalculator::parse_amount("12.5", 6), Amount::new(12_500_000));
        assert_eq!(TradePreviewCalculator::parse_amount("0.0000001", 6), Amount::ZERO);

        for junk in ["", "abc", "-5", "NaN", "inf"] {
            let preview = TradePreviewCalculator::preview_input(&p, Side::Yes, junk, 6);
            assert_eq!(preview.proposed_amount, Amount::ZERO, "input {:?}", junk);
            assert_eq!(preview.price_impact_percent, Decimal::ZERO);
        }
    }
}
