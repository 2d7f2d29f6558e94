//! Identifier and value types shared across the engine

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::{ChainError, EngineError};

/// Largest integer a `Decimal` mantissa can hold (2^96 - 1)
const DECIMAL_MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Largest scale a `Decimal` supports
const DECIMAL_MAX_SCALE: u32 = 28;

/// 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

/// Market contract address
pub type MarketId = Address;
/// Account address of the position holder
pub type UserId = Address;
/// Any contract the engine reads from or submits to
pub type ContractId = Address;

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits)
            .map_err(|e| EngineError::InvalidAddress(format!("{}: {}", s, e)))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|b: Vec<u8>| {
            EngineError::InvalidAddress(format!("{}: expected 20 bytes, got {}", s, b.len()))
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Token quantity in the token's smallest unit
///
/// Serialized as a decimal string so 18-decimal balances survive JSON
/// round-trips without precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw value in smallest units
    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Convert to human units given the token's decimals
    ///
    /// Values beyond `Decimal` precision lose their least significant digits.
    pub fn to_units(self, decimals: u32) -> Decimal {
        let mut raw = self.0;
        let mut scale = decimals;
        while scale > 0 && (raw > DECIMAL_MAX_MANTISSA || scale > DECIMAL_MAX_SCALE) {
            raw /= 10;
            scale -= 1;
        }
        if raw > DECIMAL_MAX_MANTISSA {
            return Decimal::MAX;
        }
        Decimal::from_i128_with_scale(raw as i128, scale)
    }

    /// Convert human units to smallest units, truncating excess precision
    ///
    /// Returns `None` for negative values or values that do not fit.
    pub fn from_units(value: Decimal, decimals: u32) -> Option<Amount> {
        if value.is_sign_negative() && !value.is_zero() {
            return None;
        }
        let mut scaled = value;
        for _ in 0..decimals {
            scaled = scaled.checked_mul(Decimal::TEN)?;
        }
        scaled.trunc().to_u128().map(Amount)
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self(raw as u128)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Amount)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v as u128))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Outcome side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    /// Boolean argument the market's `bet` call expects
    pub fn is_yes(self) -> bool {
        matches!(self, Side::Yes)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Side::Yes),
            "no" | "n" => Ok(Side::No),
            other => Err(format!("unknown side '{}', expected yes or no", other)),
        }
    }
}

/// Composite cache and refresh-gate key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub market: MarketId,
    pub user: UserId,
}

impl CacheKey {
    pub fn new(market: MarketId, user: UserId) -> Self {
        Self { market, user }
    }

    /// Stable name used by persistent stores
    pub fn storage_name(&self) -> String {
        format!("position-{}-{}", self.market, self.user)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market, self.user)
    }
}

/// Typed value returned by a contract read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainValue {
    Uint(Amount),
    Address(Address),
    Bool(bool),
    Tuple(Vec<ChainValue>),
}

impl ChainValue {
    pub fn as_amount(&self) -> Result<Amount, ChainError> {
        match self {
            ChainValue::Uint(amount) => Ok(*amount),
            other => Err(ChainError::Malformed(format!(
                "expected uint, got {}",
                other.kind()
            ))),
        }
    }

    pub fn as_address(&self) -> Result<Address, ChainError> {
        match self {
            ChainValue::Address(address) => Ok(*address),
            other => Err(ChainError::Malformed(format!(
                "expected address, got {}",
                other.kind()
            ))),
        }
    }

    /// Element `index` of a tuple value
    pub fn field(&self, index: usize) -> Result<&ChainValue, ChainError> {
        match self {
            ChainValue::Tuple(items) => items.get(index).ok_or_else(|| {
                ChainError::Malformed(format!(
                    "tuple has {} fields, wanted index {}",
                    items.len(),
                    index
                ))
            }),
            other => Err(ChainError::Malformed(format!(
                "expected tuple, got {}",
                other.kind()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ChainValue::Uint(_) => "uint",
            ChainValue::Address(_) => "address",
            ChainValue::Bool(_) => "bool",
            ChainValue::Tuple(_) => "tuple",
        }
    }
}

impl From<Amount> for ChainValue {
    fn from(amount: Amount) -> Self {
        ChainValue::Uint(amount)
    }
}

impl From<Address> for ChainValue {
    fn from(address: Address) -> Self {
        ChainValue::Address(address)
    }
}

impl From<bool> for ChainValue {
    fn from(flag: bool) -> Self {
        ChainValue::Bool(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MARKET: &str = "0xb5599ac305d498fc4a69b8606d0f15d573510ce6";

    #[test]
    fn test_address_round_trip() {
        let address: Address = MARKET.parse().unwrap();
        assert_eq!(address.to_string(), MARKET);

        let upper: Address = "0XB5599AC305D498FC4A69B8606D0F15D573510CE6".parse().unwrap();
        assert_eq!(upper, address);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let json = serde_json::to_string(&Amount::new(1_000_000_000_000_000_000)).unwrap();
        assert_eq!(json, "\"1000000000000000000\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::new(1_000_000_000_000_000_000));

        let from_number: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(from_number, Amount::new(42));
    }

    #[test]
    fn test_amount_units() {
        assert_eq!(Amount::new(22_000_000).to_units(6), dec!(22));
        assert_eq!(Amount::new(1_500_000).to_units(6), dec!(1.5));
        assert_eq!(Amount::from_units(dec!(10.5), 6), Some(Amount::new(10_500_000)));
        assert_eq!(Amount::from_units(dec!(0.0000001), 6), Some(Amount::ZERO));
        assert_eq!(Amount::from_units(dec!(-1), 6), None);
    }

    #[test]
    fn test_amount_units_beyond_decimal_precision() {
        let huge = Amount::new(u128::MAX);
        assert!(huge.to_units(18) > dec!(100000000000000000000));
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("YES".parse::<Side>(), Ok(Side::Yes));
        assert_eq!("n".parse::<Side>(), Ok(Side::No));
        assert!("maybe".parse::<Side>().is_err());
        assert_eq!(Side::Yes.opposite(), Side::No);
    }

    #[test]
    fn test_chain_value_accessors() {
        let value = ChainValue::Tuple(vec![
            ChainValue::Uint(Amount::new(7)),
            ChainValue::Bool(true),
        ]);
        assert_eq!(value.field(0).unwrap().as_amount().unwrap(), Amount::new(7));
        assert!(value.field(1).unwrap().as_amount().is_err());
        assert!(value.field(2).is_err());
        assert!(ChainValue::Bool(false).field(0).is_err());
    }

    #[test]
    fn test_cache_key_storage_name() {
        let market: Address = MARKET.parse().unwrap();
        let user = Address::new([0x11; 20]);
        let key = CacheKey::new(market, user);
        assert_eq!(
            key.storage_name(),
            format!("position-{}-0x{}", MARKET, "11".repeat(20))
        );
    }
}
