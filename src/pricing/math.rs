//! Integer fixed-point helpers for token amounts
//!
//! Amounts are `u128` smallest units. Products of two amounts can exceed
//! `u128`, so multiplication goes through a 256-bit intermediate before the
//! division brings the result back into range.

use rust_decimal::Decimal;

use crate::common::types::Amount;

/// Largest integer a `Decimal` can hold without losing digits
const DECIMAL_MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Decimal places kept in percentages; leaves headroom so `100 - p` is exact
pub const PERCENT_SCALE: u32 = 18;

const LOW_64: u128 = u64::MAX as u128;

/// Full 256-bit product of `a * b` as `(high, low)` halves
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_lo, a_hi) = (a & LOW_64, a >> 64);
    let (b_lo, b_hi) = (b & LOW_64, b >> 64);

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    let mid = (lo_lo >> 64) + (lo_hi & LOW_64) + (hi_lo & LOW_64);
    let low = (lo_lo & LOW_64) | (mid << 64);
    let high = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / c)` without intermediate overflow
///
/// Returns `None` when `c == 0` or the quotient does not fit in `u128`.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }

    let (high, low) = widening_mul(a, b);
    if high == 0 {
        return Some(low / c);
    }
    if high >= c {
        return None;
    }

    // Shift-subtract long division of (high:low) by c; remainder stays < c
    let mut remainder = high;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= c {
            remainder = remainder.wrapping_sub(c);
            quotient |= 1;
        }
    }
    Some(quotient)
}

/// `floor(amount * numerator / denominator)` on [`Amount`]s, saturating
///
/// A zero denominator yields zero.
pub fn scale_amount(amount: Amount, numerator: Amount, denominator: Amount) -> Amount {
    if denominator.is_zero() {
        return Amount::ZERO;
    }
    mul_div_floor(amount.raw(), numerator.raw(), denominator.raw())
        .map(Amount::new)
        .unwrap_or(Amount::new(u128::MAX))
}

/// `numerator / denominator * 100` as a decimal percentage
///
/// Inputs too large for `Decimal` are scaled down together. The result is
/// rounded to [`PERCENT_SCALE`] places. A zero denominator yields zero.
pub fn ratio_percent(numerator: Amount, denominator: Amount) -> Decimal {
    let (mut num, mut den) = (numerator.raw(), denominator.raw());
    if den == 0 {
        return Decimal::ZERO;
    }
    while num > DECIMAL_MAX_MANTISSA || den > DECIMAL_MAX_MANTISSA {
        num /= 10;
        den /= 10;
    }

    let num = Decimal::from_i128_with_scale(num as i128, 0);
    let den = Decimal::from_i128_with_scale(den as i128, 0);
    num.checked_div(den)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percent| percent.round_dp(PERCENT_SCALE))
        .unwrap_or(Decimal::MAX)
}

/// Sum of `parts`, halving all of them together until the sum fits
///
/// Halving preserves the parts' ratios to within one unit, which is all
/// the pricing formulas depend on.
pub fn parts_with_total<const N: usize>(parts: [Amount; N]) -> ([Amount; N], Amount) {
    let mut raw = parts.map(|part| part.raw());
    loop {
        let total = raw.iter().try_fold(0u128, |sum, part| sum.checked_add(*part));
        match total {
            Some(total) => return (raw.map(Amount::new), Amount::new(total)),
            None => raw.iter_mut().for_each(|part| *part >>= 1),
        }
    }
}

/// Sum of two reserves; see [`parts_with_total`]
pub fn reserves_with_total(yes: Amount, no: Amount) -> (Amount, Amount, Amount) {
    let ([yes, no], total) = parts_with_total([yes, no]);
    (yes, no, total)
}
