//! STBChef Library
//!
//! Signal evaluation and portfolio rebalancing engine for an ETH/USDC
//! trading-assistant dashboard driven by three advisory models.

pub mod config;
pub mod consensus;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod notification;
pub mod persistence;
pub mod rebalance;
pub mod replay;
pub mod scoring;
pub mod session;
pub mod threshold;
pub mod types;
pub mod volatility;

pub use engine::{EngineConfig, EngineContext, TickInput, TickOutcome, TickReport};
pub use errors::{EngineError, SkipReason};
pub use types::{Decision, DecisionSet, MarketRegime, ModelId, PriceSample};
