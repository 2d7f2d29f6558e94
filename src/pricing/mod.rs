//! Pricing module
//!
//! Pure functions over pool state:
//! - Position valuation and implied prices ([`PricingEngine`])
//! - Trade previews ([`TradePreviewCalculator`])
//! - Overflow-safe integer helpers used by both

pub mod engine;
pub mod math;
pub mod preview;

pub use engine::{DerivedPosition, LiquidityWithdrawal, PricingEngine};
pub use preview::{TradePreview, TradePreviewCalculator};
