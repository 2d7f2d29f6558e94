//! Position engine facade
//!
//! Single entry point for UI and CLI callers: positions, manual refresh,
//! derived valuations, trade previews and trade submission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::traits::{CacheStore, ChainReader, Clock, SubmitReceipt, Submitter};
use crate::common::types::{Address, Amount, ChainValue, MarketId, Side, UserId};
use crate::config::EngineConfig;
use crate::position::decode::{decode_amount, ALLOWANCE};
use crate::position::{
    GetOptions, PoolState, PositionAggregator, PositionRead, PositionSnapshot, RefreshDecision,
    RefreshScheduler,
};
use crate::pricing::{DerivedPosition, PricingEngine, TradePreview, TradePreviewCalculator};

/// Market function placing a bet: `bet(bool isYes, uint256 amount)`
pub const BET: &str = "bet";
/// Market function depositing collateral into the pool
pub const ADD_LIQUIDITY: &str = "addLiquidity";
/// Market function burning liquidity shares
pub const REMOVE_LIQUIDITY: &str = "removeLiquidity";
/// Market function paying out winning tokens after resolution
pub const REDEEM: &str = "redeem";
/// Market function returning stakes of a cancelled market
pub const REFUND: &str = "refund";

/// State-changing action on a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TradeAction {
    Bet { side: Side, amount: Amount },
    AddLiquidity { amount: Amount },
    RemoveLiquidity { shares: Amount },
    Redeem,
    Refund,
}

impl TradeAction {
    /// Contract function and arguments for this action
    pub fn call(&self) -> (&'static str, Vec<ChainValue>) {
        match *self {
            TradeAction::Bet { side, amount } => (
                BET,
                vec![ChainValue::Bool(side.is_yes()), ChainValue::Uint(amount)],
            ),
            TradeAction::AddLiquidity { amount } => {
                (ADD_LIQUIDITY, vec![ChainValue::Uint(amount)])
            }
            TradeAction::RemoveLiquidity { shares } => {
                (REMOVE_LIQUIDITY, vec![ChainValue::Uint(shares)])
            }
            TradeAction::Redeem => (REDEEM, Vec::new()),
            TradeAction::Refund => (REFUND, Vec::new()),
        }
    }

    /// Collateral the market pulls from the user, if any
    pub fn stake(&self) -> Option<Amount> {
        match *self {
            TradeAction::Bet { amount, .. } | TradeAction::AddLiquidity { amount } => Some(amount),
            _ => None,
        }
    }

    fn quantity(&self) -> Option<Amount> {
        match *self {
            TradeAction::RemoveLiquidity { shares } => Some(shares),
            _ => self.stake(),
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Bet { side, amount } => write!(f, "bet {} on {}", amount, side),
            TradeAction::AddLiquidity { amount } => write!(f, "add {} liquidity", amount),
            TradeAction::RemoveLiquidity { shares } => write!(f, "remove {} shares", shares),
            TradeAction::Redeem => write!(f, "redeem winnings"),
            TradeAction::Refund => write!(f, "refund stakes"),
        }
    }
}

/// Facade over aggregation, pricing and submission
#[derive(Clone)]
pub struct PositionEngine {
    aggregator: PositionAggregator,
    submitter: Option<Arc<dyn Submitter>>,
    collateral_token: Option<Address>,
    collateral_decimals: u32,
}

impl PositionEngine {
    pub fn new(aggregator: PositionAggregator, collateral_decimals: u32) -> Self {
        Self {
            aggregator,
            submitter: None,
            collateral_token: None,
            collateral_decimals,
        }
    }

    /// Wire an engine from configuration and its collaborators
    pub fn from_config(
        config: &EngineConfig,
        reader: Arc<dyn ChainReader>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scheduler = RefreshScheduler::new(config.refresh.cooldown_ms, Arc::clone(&clock));
        let aggregator = PositionAggregator::new(
            reader,
            cache,
            scheduler,
            clock,
            config.aggregator_settings(),
        );
        let engine = Self::new(aggregator, config.collateral.decimals);
        match config.collateral.token {
            Some(token) => engine.with_collateral_token(token),
            None => engine,
        }
    }

    /// Enable [`PositionEngine::submit_trade`]
    pub fn with_submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Check bets and deposits against the user's allowance on `token`
    pub fn with_collateral_token(mut self, token: Address) -> Self {
        self.collateral_token = Some(token);
        self
    }

    pub fn aggregator(&self) -> &PositionAggregator {
        &self.aggregator
    }

    pub async fn get_position(
        &self,
        market: MarketId,
        user: UserId,
        opts: GetOptions,
    ) -> Result<PositionRead> {
        self.aggregator.get_position(market, user, opts).await
    }

    pub async fn refresh_position(&self, market: MarketId, user: UserId) -> RefreshDecision {
        self.aggregator.refresh_position(market, user).await
    }

    pub fn derive_position(&self, snapshot: &PositionSnapshot) -> DerivedPosition {
        PricingEngine::derive_position(snapshot)
    }

    pub fn preview(&self, pool: &PoolState, side: Side, amount: Amount) -> TradePreview {
        TradePreviewCalculator::preview(pool, side, amount)
    }

    /// Preview from typed collateral text, in the configured collateral decimals
    pub fn preview_input(&self, pool: &PoolState, side: Side, text: &str) -> TradePreview {
        TradePreviewCalculator::preview_input(pool, side, text, self.collateral_decimals)
    }

    /// Submit a trade and invalidate the cached position once it confirms
    ///
    /// Zero amounts are rejected without reaching the submitter. With a
    /// collateral token configured, bets and deposits larger than the user's
    /// allowance for the market fail with
    /// [`EngineError::InsufficientAllowance`] before submission.
    #[instrument(skip_all, fields(market = %market, user = %user, action = %action))]
    pub async fn submit_trade(
        &self,
        market: MarketId,
        user: UserId,
        action: TradeAction,
    ) -> Result<SubmitReceipt> {
        if action.quantity().is_some_and(|quantity| quantity.is_zero()) {
            return Err(EngineError::InvalidTrade(format!(
                "{}: amount must be positive",
                action
            )));
        }
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| EngineError::Configuration("no submitter configured".to_string()))?;

        if let Some(stake) = action.stake() {
            self.ensure_allowance(market, user, stake).await?;
        }

        let (function, args) = action.call();
        let receipt = submitter
            .submit(&market, function, &args)
            .await
            .map_err(EngineError::SubmissionFailed)?;

        if receipt.confirmed {
            info!("Trade confirmed");
            self.aggregator.invalidate(market, user);
        } else {
            warn!("Trade submitted but not confirmed; cached position kept");
        }
        Ok(receipt)
    }

    /// Approved collateral of `user` for `market`, `None` without a collateral token
    pub async fn allowance(&self, market: MarketId, user: UserId) -> Result<Option<Amount>> {
        let Some(token) = self.collateral_token else {
            return Ok(None);
        };
        let args = [ChainValue::Address(user), ChainValue::Address(market)];
        let value = self
            .aggregator
            .read_value(&token, ALLOWANCE, &args)
            .await
            .and_then(|value| decode_amount(&value))
            .map_err(EngineError::SubmissionFailed)?;
        Ok(Some(value))
    }

    async fn ensure_allowance(&self, market: MarketId, user: UserId, stake: Amount) -> Result<()> {
        match self.allowance(market, user).await? {
            Some(approved) if approved < stake => {
                warn!(%approved, %stake, "Collateral not approved for stake");
                Err(EngineError::InsufficientAllowance {
                    required: stake,
                    approved,
                })
            }
            Some(_) => Ok(()),
            None => {
                debug!("No collateral token configured, allowance not checked");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for PositionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionEngine")
            .field("aggregator", &self.aggregator)
            .field("has_submitter", &self.submitter.is_some())
            .field("collateral_token", &self.collateral_token)
            .field("collateral_decimals", &self.collateral_decimals)
            .finish()
    }
}
