//! Portfolio Rebalancer - Allocation-driven swap recommendation
//!
//! Priority order:
//! 1. Severe imbalance (more than `severe_slack` points outside the band) forces a
//!    swap back to the nearer bound regardless of the models
//! 2. Otherwise a model consensus is adopted, sized by the band
//! 3. Otherwise the plain band rule (BUY below, SELL above, HOLD inside)

pub mod sizing;

use serde::{Deserialize, Serialize};

use crate::consensus::agreeing_models;
use crate::types::{is_valid_price, Decision, DecisionSet, MarketRegime, ModelId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Target ETH allocation range (%) in a bearish regime
    pub bearish_min: f64,
    pub bearish_max: f64,
    /// Target ETH allocation range (%) in a bullish regime
    pub bullish_min: f64,
    pub bullish_max: f64,
    /// Points outside the band that count as a severe imbalance
    pub severe_slack: f64,
    /// Smallest meaningful swap, in USD
    pub dust_usd: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            bearish_min: 20.0,
            bearish_max: 40.0,
            bullish_min: 60.0,
            bullish_max: 80.0,
            severe_slack: 10.0,
            dust_usd: 0.10,
        }
    }
}

/// Target ETH allocation range in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationBand {
    pub min: f64,
    pub max: f64,
}

impl AllocationBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, allocation_pct: f64) -> bool {
        allocation_pct >= self.min && allocation_pct <= self.max
    }
}

/// Balances and price at one refresh. Derived fields are computed once in `new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub eth_balance: f64,
    pub usdc_balance: f64,
    pub eth_usd: f64,
    pub total_usd: f64,
    /// ETH share of total value (%); 0 when the portfolio is empty
    pub eth_allocation_pct: f64,
}

impl PortfolioSnapshot {
    pub fn new(eth_balance: f64, usdc_balance: f64, eth_usd: f64) -> Self {
        let eth_value = if is_valid_price(eth_usd) {
            eth_balance * eth_usd
        } else {
            0.0
        };
        let total_usd = eth_value + usdc_balance;
        let eth_allocation_pct = if total_usd > 0.0 && total_usd.is_finite() {
            eth_value / total_usd * 100.0
        } else {
            0.0
        };

        Self {
            eth_balance,
            usdc_balance,
            eth_usd,
            total_usd,
            eth_allocation_pct,
        }
    }

    pub fn eth_value_usd(&self) -> f64 {
        self.total_usd - self.usdc_balance
    }

    /// Nothing sensible can be computed from an empty or unpriced portfolio
    pub fn is_degenerate(&self) -> bool {
        !(self.total_usd.is_finite() && self.total_usd > 0.0) || !is_valid_price(self.eth_usd)
    }
}

/// Unit of `RebalanceDecision::amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AmountUnit {
    /// USDC spent on a BUY
    Usd,
    /// ETH sold on a SELL
    Eth,
}

impl std::fmt::Display for AmountUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountUnit::Usd => write!(f, "USD"),
            AmountUnit::Eth => write!(f, "ETH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceReason {
    SevereImbalance,
    Consensus,
    Allocation,
    Balanced,
    DegeneratePortfolio,
}

impl std::fmt::Display for RebalanceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebalanceReason::SevereImbalance => write!(f, "severe_imbalance"),
            RebalanceReason::Consensus => write!(f, "consensus"),
            RebalanceReason::Allocation => write!(f, "allocation"),
            RebalanceReason::Balanced => write!(f, "balanced"),
            RebalanceReason::DegeneratePortfolio => write!(f, "degenerate_portfolio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceDecision {
    pub action: Decision,
    /// USD for BUY, ETH for SELL, 0 for HOLD
    pub amount: f64,
    pub unit: AmountUnit,
    pub direction: String,
    /// Models whose own decision equals `action`
    pub agreeing_models: Vec<ModelId>,
    pub reason: RebalanceReason,
    pub allocation_pct: f64,
    pub band: AllocationBand,
    /// Allocation the swap is sized to reach
    pub target_allocation_pct: Option<f64>,
}

impl RebalanceDecision {
    pub fn is_out_of_range(&self) -> bool {
        !self.band.contains(self.allocation_pct)
    }

    pub fn agreeing_names(&self) -> Vec<&'static str> {
        self.agreeing_models.iter().map(|m| m.display_name()).collect()
    }
}

pub fn direction_label(action: Decision) -> &'static str {
    match action {
        Decision::Buy => "USDC → ETH",
        Decision::Sell => "ETH → USDC",
        Decision::Hold => "no swap",
    }
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioRebalancer {
    config: RebalanceConfig,
}

impl PortfolioRebalancer {
    pub fn new(config: RebalanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    pub fn band_for(&self, regime: MarketRegime) -> AllocationBand {
        match regime {
            MarketRegime::Bullish => {
                AllocationBand::new(self.config.bullish_min, self.config.bullish_max)
            }
            MarketRegime::Bearish => {
                AllocationBand::new(self.config.bearish_min, self.config.bearish_max)
            }
        }
    }

    pub fn decide(
        &self,
        snapshot: &PortfolioSnapshot,
        regime: MarketRegime,
        consensus: Option<Decision>,
        decisions: &DecisionSet,
    ) -> RebalanceDecision {
        self.decide_with_band(snapshot, self.band_for(regime), consensus, decisions)
    }

    pub fn decide_with_band(
        &self,
        snapshot: &PortfolioSnapshot,
        band: AllocationBand,
        consensus: Option<Decision>,
        decisions: &DecisionSet,
    ) -> RebalanceDecision {
        let allocation = snapshot.eth_allocation_pct;

        if snapshot.is_degenerate() {
            return self.build(
                Decision::Hold,
                None,
                RebalanceReason::DegeneratePortfolio,
                snapshot,
                band,
                decisions,
            );
        }

        let slack = self.config.severe_slack;
        if allocation < band.min - slack {
            return self.build(
                Decision::Buy,
                Some(band.min),
                RebalanceReason::SevereImbalance,
                snapshot,
                band,
                decisions,
            );
        }
        if allocation > band.max + slack {
            return self.build(
                Decision::Sell,
                Some(band.max),
                RebalanceReason::SevereImbalance,
                snapshot,
                band,
                decisions,
            );
        }

        if let Some(action) = consensus {
            let target = match action {
                Decision::Buy if allocation < band.min => Some(band.min),
                Decision::Buy if allocation <= band.max => Some((allocation + band.max) / 2.0),
                Decision::Sell if allocation > band.max => Some(band.max),
                Decision::Sell if allocation >= band.min => Some((allocation + band.min) / 2.0),
                // already past the band on the consensus side: no-op swap
                Decision::Buy | Decision::Sell => Some(allocation),
                Decision::Hold => None,
            };
            return self.build(
                action,
                target,
                RebalanceReason::Consensus,
                snapshot,
                band,
                decisions,
            );
        }

        if allocation < band.min {
            self.build(
                Decision::Buy,
                Some(band.min),
                RebalanceReason::Allocation,
                snapshot,
                band,
                decisions,
            )
        } else if allocation > band.max {
            self.build(
                Decision::Sell,
                Some(band.max),
                RebalanceReason::Allocation,
                snapshot,
                band,
                decisions,
            )
        } else {
            self.build(
                Decision::Hold,
                None,
                RebalanceReason::Balanced,
                snapshot,
                band,
                decisions,
            )
        }
    }

    /// Swap size to move the allocation to `target_pct`: USD for BUY, ETH for SELL.
    /// Negative sizes clamp to 0; positive sizes below dust are raised to dust.
    pub fn swap_amount(
        &self,
        snapshot: &PortfolioSnapshot,
        action: Decision,
        target_pct: f64,
    ) -> f64 {
        if snapshot.is_degenerate() {
            return 0.0;
        }
        let allocation = snapshot.eth_allocation_pct;

        let (raw, dust) = match action {
            Decision::Buy => (
                (target_pct - allocation) / 100.0 * snapshot.total_usd,
                self.config.dust_usd,
            ),
            Decision::Sell => (
                (allocation - target_pct) / 100.0 * snapshot.total_usd / snapshot.eth_usd,
                self.config.dust_usd / snapshot.eth_usd,
            ),
            Decision::Hold => (0.0, 0.0),
        };

        apply_dust_floor(raw, dust)
    }

    fn build(
        &self,
        action: Decision,
        target_pct: Option<f64>,
        reason: RebalanceReason,
        snapshot: &PortfolioSnapshot,
        band: AllocationBand,
        decisions: &DecisionSet,
    ) -> RebalanceDecision {
        let amount = target_pct
            .map(|t| self.swap_amount(snapshot, action, t))
            .unwrap_or(0.0);
        let unit = match action {
            Decision::Sell => AmountUnit::Eth,
            Decision::Buy | Decision::Hold => AmountUnit::Usd,
        };

        RebalanceDecision {
            action,
            amount,
            unit,
            direction: direction_label(action).to_string(),
            agreeing_models: agreeing_models(decisions, action),
            reason,
            allocation_pct: snapshot.eth_allocation_pct,
            band,
            target_allocation_pct: target_pct,
        }
    }
}

fn apply_dust_floor(amount: f64, dust: f64) -> f64 {
    if !amount.is_finite() || amount <= 0.0 {
        0.0
    } else if amount < dust {
        dust
    } else {
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_band() -> AllocationBand {
        AllocationBand::new(20.0, 80.0)
    }

    /// Portfolio worth $10,000 at $2,000/ETH with the given ETH allocation
    fn portfolio(allocation_pct: f64) -> PortfolioSnapshot {
        let eth_value = 10_000.0 * allocation_pct / 100.0;
        PortfolioSnapshot::new(eth_value / 2000.0, 10_000.0 - eth_value, 2000.0)
    }

    fn no_votes() -> DecisionSet {
        DecisionSet::default()
    }

    #[test]
    fn snapshot_derives_totals() {
        let s = PortfolioSnapshot::new(1.0, 2000.0, 2000.0);
        assert_eq!(s.total_usd, 4000.0);
        assert_eq!(s.eth_allocation_pct, 50.0);
        assert_eq!(s.eth_value_usd(), 2000.0);
    }

    #[test]
    fn severe_underweight_buys_to_min_regardless_of_consensus() {
        let r = PortfolioRebalancer::default();
        let votes = DecisionSet::new(Some(Decision::Sell), Some(Decision::Sell), None);
        let d = r.decide_with_band(&portfolio(5.0), wide_band(), Some(Decision::Sell), &votes);

        assert_eq!(d.action, Decision::Buy);
        assert_eq!(d.reason, RebalanceReason::SevereImbalance);
        assert_eq!(d.unit, AmountUnit::Usd);
        // 15% of $10,000
        assert!((d.amount - 1500.0).abs() < 1e-6);
        assert_eq!(d.target_allocation_pct, Some(20.0));
        assert!(d.agreeing_models.is_empty());
        assert_eq!(d.direction, "USDC → ETH");
    }

    #[test]
    fn severe_overweight_sells_eth_to_max() {
        let r = PortfolioRebalancer::default();
        let d = r.decide_with_band(&portfolio(95.0), wide_band(), None, &no_votes());

        assert_eq!(d.action, Decision::Sell);
        assert_eq!(d.unit, AmountUnit::Eth);
        // 15% of $10,000 at $2,000
        assert!((d.amount - 0.75).abs() < 1e-9);
    }

    #[test]
    fn consensus_sell_inside_band_targets_midpoint() {
        let r = PortfolioRebalancer::default();
        let votes = DecisionSet::new(
            Some(Decision::Sell),
            Some(Decision::Sell),
            Some(Decision::Hold),
        );
        let d = r.decide_with_band(&portfolio(50.0), wide_band(), Some(Decision::Sell), &votes);

        assert_eq!(d.action, Decision::Sell);
        assert_eq!(d.reason, RebalanceReason::Consensus);
        assert_eq!(d.target_allocation_pct, Some(35.0));
        // 15% of $10,000 = $1,500 = 0.75 ETH (not 30% to the bound)
        assert!((d.amount - 0.75).abs() < 1e-9);
        assert_eq!(d.agreeing_models, vec![ModelId::Gemini, ModelId::Groq]);
    }

    #[test]
    fn consensus_buy_sizing() {
        let r = PortfolioRebalancer::default();
        let votes = DecisionSet::new(Some(Decision::Buy), Some(Decision::Buy), None);

        // below band (but not severe) -> to min
        let d = r.decide_with_band(&portfolio(15.0), wide_band(), Some(Decision::Buy), &votes);
        assert!((d.amount - 500.0).abs() < 1e-6);

        // inside band -> midpoint toward max
        let d = r.decide_with_band(&portfolio(40.0), wide_band(), Some(Decision::Buy), &votes);
        assert_eq!(d.target_allocation_pct, Some(60.0));
        assert!((d.amount - 2000.0).abs() < 1e-6);

        // above band (but not severe) -> no-op
        let d = r.decide_with_band(&portfolio(85.0), wide_band(), Some(Decision::Buy), &votes);
        assert_eq!(d.action, Decision::Buy);
        assert_eq!(d.amount, 0.0);
    }

    #[test]
    fn consensus_sell_sizing() {
        let r = PortfolioRebalancer::default();
        let votes = DecisionSet::new(Some(Decision::Sell), Some(Decision::Sell), None);

        // above band (but not severe) -> to max
        let d = r.decide_with_band(&portfolio(85.0), wide_band(), Some(Decision::Sell), &votes);
        assert_eq!(d.reason, RebalanceReason::Consensus);
        assert_eq!(d.target_allocation_pct, Some(80.0));
        // 5% of $10,000 at $2,000
        assert!((d.amount - 0.25).abs() < 1e-9);

        // below band (but not severe) -> no-op
        let d = r.decide_with_band(&portfolio(15.0), wide_band(), Some(Decision::Sell), &votes);
        assert_eq!(d.action, Decision::Sell);
        assert_eq!(d.unit, AmountUnit::Eth);
        assert_eq!(d.amount, 0.0);
    }

    #[test]
    fn consensus_hold_is_adopted() {
        let r = PortfolioRebalancer::default();
        let votes = DecisionSet::new(
            Some(Decision::Hold),
            Some(Decision::Hold),
            Some(Decision::Buy),
        );
        let d = r.decide_with_band(&portfolio(15.0), wide_band(), Some(Decision::Hold), &votes);
        assert_eq!(d.action, Decision::Hold);
        assert_eq!(d.amount, 0.0);
        assert_eq!(d.agreeing_models.len(), 2);
    }

    #[test]
    fn fallback_band_rule() {
        let r = PortfolioRebalancer::default();
        let d = r.decide_with_band(&portfolio(15.0), wide_band(), None, &no_votes());
        assert_eq!((d.action, d.reason), (Decision::Buy, RebalanceReason::Allocation));

        let d = r.decide_with_band(&portfolio(85.0), wide_band(), None, &no_votes());
        assert_eq!((d.action, d.reason), (Decision::Sell, RebalanceReason::Allocation));

        let d = r.decide_with_band(&portfolio(50.0), wide_band(), None, &no_votes());
        assert_eq!((d.action, d.reason), (Decision::Hold, RebalanceReason::Balanced));
        assert!(!d.is_out_of_range());
    }

    #[test]
    fn regime_selects_band() {
        let r = PortfolioRebalancer::default();
        assert_eq!(r.band_for(MarketRegime::Bearish), AllocationBand::new(20.0, 40.0));
        assert_eq!(r.band_for(MarketRegime::Bullish), AllocationBand::new(60.0, 80.0));

        // 50% is above the bearish band but inside slack
        let d = r.decide(&portfolio(50.0), MarketRegime::Bearish, None, &no_votes());
        assert_eq!(d.action, Decision::Sell);
        assert!(d.is_out_of_range());
    }

    #[test]
    fn dust_floor_and_clamp() {
        let r = PortfolioRebalancer::default();
        let s = portfolio(19.9995);
        // raw $0.05 -> raised to $0.10
        assert!((r.swap_amount(&s, Decision::Buy, 20.0) - 0.10).abs() < 1e-9);
        // wrong side of target clamps to zero
        assert_eq!(r.swap_amount(&s, Decision::Buy, 10.0), 0.0);
        assert_eq!(r.swap_amount(&s, Decision::Sell, 30.0), 0.0);
    }

    #[test]
    fn empty_portfolio_holds() {
        let r = PortfolioRebalancer::default();
        let empty = PortfolioSnapshot::new(0.0, 0.0, 2000.0);
        let votes = DecisionSet::new(Some(Decision::Buy), Some(Decision::Buy), None);
        let d = r.decide_with_band(&empty, wide_band(), Some(Decision::Buy), &votes);

        assert_eq!(d.action, Decision::Hold);
        assert_eq!(d.amount, 0.0);
        assert_eq!(d.reason, RebalanceReason::DegeneratePortfolio);

        let unpriced = PortfolioSnapshot::new(1.0, 100.0, f64::NAN);
        let d = r.decide_with_band(&unpriced, wide_band(), None, &no_votes());
        assert_eq!(d.action, Decision::Hold);
    }
}
