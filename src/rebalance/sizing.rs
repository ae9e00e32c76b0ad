//! Confidence-weighted sizing for a single model's recommendation
//!
//! Spends up to 30% of the source balance scaled by confidence, with a small
//! floor and a 90% cap so a swap never drains the wallet.

use serde::{Deserialize, Serialize};

use super::{AmountUnit, PortfolioSnapshot};
use crate::types::{is_valid_price, Decision};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceSizing {
    /// Fraction of balance at confidence 1.0
    pub max_fraction: f64,
    /// Absolute floor for BUY (USDC)
    pub min_buy_usd: f64,
    /// Absolute floor for SELL (ETH)
    pub min_sell_eth: f64,
    /// Floor never exceeds this fraction of balance
    pub floor_fraction: f64,
    /// Hard cap as fraction of balance
    pub cap_fraction: f64,
}

impl Default for ConfidenceSizing {
    fn default() -> Self {
        Self {
            max_fraction: 0.3,
            min_buy_usd: 10.0,
            min_sell_eth: 0.01,
            floor_fraction: 0.1,
            cap_fraction: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapSuggestion {
    pub action: Decision,
    pub amount: f64,
    pub unit: AmountUnit,
    /// Estimated output in the other asset at the snapshot price
    pub estimated_out: f64,
}

impl ConfidenceSizing {
    /// Size a BUY (spend USDC) or SELL (sell ETH). `None` for HOLD, an unpriced
    /// portfolio or an empty source balance.
    pub fn suggest(
        &self,
        snapshot: &PortfolioSnapshot,
        action: Decision,
        confidence: f64,
    ) -> Option<SwapSuggestion> {
        if !is_valid_price(snapshot.eth_usd) {
            return None;
        }
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        let (balance, min_abs, unit) = match action {
            Decision::Buy => (snapshot.usdc_balance, self.min_buy_usd, AmountUnit::Usd),
            Decision::Sell => (snapshot.eth_balance, self.min_sell_eth, AmountUnit::Eth),
            Decision::Hold => return None,
        };
        if !(balance.is_finite() && balance > 0.0) {
            return None;
        }

        let floor = min_abs.min(balance * self.floor_fraction);
        let cap = balance * self.cap_fraction;
        let amount = (balance * self.max_fraction * confidence).max(floor).min(cap);

        let estimated_out = match action {
            Decision::Buy => amount / snapshot.eth_usd,
            _ => amount * snapshot.eth_usd,
        };

        Some(SwapSuggestion {
            action,
            amount,
            unit,
            estimated_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_scales_with_confidence() {
        let sizing = ConfidenceSizing::default();
        let s = PortfolioSnapshot::new(1.0, 1000.0, 2000.0);

        let full = sizing.suggest(&s, Decision::Buy, 1.0).unwrap();
        assert!((full.amount - 300.0).abs() < 1e-9);
        assert_eq!(full.unit, AmountUnit::Usd);
        assert!((full.estimated_out - 0.15).abs() < 1e-9);

        let half = sizing.suggest(&s, Decision::Buy, 0.5).unwrap();
        assert!((half.amount - 150.0).abs() < 1e-9);
    }

    #[test]
    fn floor_applies_at_low_confidence() {
        let sizing = ConfidenceSizing::default();
        let s = PortfolioSnapshot::new(1.0, 1000.0, 2000.0);
        // min(10, 100) = 10
        let buy = sizing.suggest(&s, Decision::Buy, 0.0).unwrap();
        assert!((buy.amount - 10.0).abs() < 1e-9);
        // min(0.01, 0.1) = 0.01 ETH
        let sell = sizing.suggest(&s, Decision::Sell, 0.0).unwrap();
        assert!((sell.amount - 0.01).abs() < 1e-12);
        assert!((sell.estimated_out - 20.0).abs() < 1e-9);
    }

    #[test]
    fn small_balance_floor_follows_balance() {
        let sizing = ConfidenceSizing::default();
        let s = PortfolioSnapshot::new(0.0, 20.0, 2000.0);
        // floor min(10, 2) = 2; 20 * 0.3 * 0.1 = 0.6 -> 2
        let buy = sizing.suggest(&s, Decision::Buy, 0.1).unwrap();
        assert!((buy.amount - 2.0).abs() < 1e-9);
    }

    #[test]
    fn hold_and_empty_balances_yield_nothing() {
        let sizing = ConfidenceSizing::default();
        let s = PortfolioSnapshot::new(0.0, 1000.0, 2000.0);
        assert!(sizing.suggest(&s, Decision::Hold, 1.0).is_none());
        assert!(sizing.suggest(&s, Decision::Sell, 1.0).is_none());

        let unpriced = PortfolioSnapshot::new(1.0, 1000.0, 0.0);
        assert!(sizing.suggest(&unpriced, Decision::Buy, 1.0).is_none());
    }
}
