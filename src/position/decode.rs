//! Typed decoding of contract reads
//!
//! Contract return values arrive as loosely shaped [`ChainValue`] trees.
//! Everything past this module works with [`PoolState`], [`UserHoldings`]
//! and [`MarketContracts`] only, so a change in a contract's return layout
//! is contained here.

use crate::common::errors::ChainError;
use crate::common::types::{Address, Amount, ChainValue, MarketId};

/// View function returning the market's parameter tuple
pub const MARKET_PARAMS: &str = "marketParams";
/// View function returning the pool reserves tuple
pub const POOL_STATE: &str = "poolState";
/// Liquidity shares held by an account
pub const LIQUIDITY_POSITIONS: &str = "liquidityPositions";
/// Total outstanding liquidity shares
pub const TOTAL_LIQUIDITY_SHARES: &str = "totalLiquidityShares";
/// ERC-20 balance of an account
pub const BALANCE_OF: &str = "balanceOf";
/// ERC-20 amount a spender may pull from an owner: `allowance(owner, spender)`
pub const ALLOWANCE: &str = "allowance";

/// Index of the YES token address in `marketParams`
const PARAMS_YES_TOKEN: usize = 2;
/// Index of the NO token address in `marketParams`
const PARAMS_NO_TOKEN: usize = 3;

/// Contracts that together hold a user's position in one market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketContracts {
    pub market: MarketId,
    pub yes_token: Address,
    pub no_token: Address,
}

/// Decode the `marketParams` tuple into the market's token addresses
pub fn decode_market_contracts(
    market: MarketId,
    value: &ChainValue,
) -> Result<MarketContracts, ChainError> {
    Ok(MarketContracts {
        market,
        yes_token: value.field(PARAMS_YES_TOKEN)?.as_address()?,
        no_token: value.field(PARAMS_NO_TOKEN)?.as_address()?,
    })
}

/// Decode `poolState` into `(reserve_yes, reserve_no)`
///
/// Fields after the two reserves (AMM virtual reserves) are ignored.
pub fn decode_reserves(value: &ChainValue) -> Result<(Amount, Amount), ChainError> {
    Ok((value.field(0)?.as_amount()?, value.field(1)?.as_amount()?))
}

/// Decode a scalar uint read
pub fn decode_amount(value: &ChainValue) -> Result<Amount, ChainError> {
    value.as_amount()
}
