//! Scoring Engine - Judges past model calls against realized price moves
//!
//! Implements:
//! - Graduated trade score (0.0 - 1.5) with a saturating magnitude bonus
//! - Strict binary correctness used for raw accuracy
//! - Per-model pending decision, bounded history and cumulative counters

mod history;

pub use history::{
    AccuracyRating, DecisionCounts, ModelAccuracyState, ModelStatsSummary, ModelTracker,
    PendingDecision, TradeRecord,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{is_valid_price, Decision, DecisionSet, ModelId};

/// Upper bound of any trade score
pub const MAX_SCORE: f64 = 1.5;

/// How the magnitude bonus for a correct BUY/SELL is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusRule {
    /// (|move| - threshold) / bonus_divisor
    Linear,
    /// (|move| - threshold) / (2 * threshold)
    ThresholdRelative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub bonus_rule: BonusRule,
    /// Divisor for the linear bonus rule
    pub bonus_divisor: f64,
    /// Bonus saturates here
    pub max_bonus: f64,
    /// Extra credit for a HOLD when the price barely moved (scaled by closeness to zero)
    pub hold_stability_bonus: f64,
    /// HOLD still earns half credit inside threshold * this multiplier
    pub hold_near_multiplier: f64,
    /// Score for a HOLD that missed a real move
    pub hold_miss_score: f64,
    /// Trade records kept per model (FIFO)
    pub history_capacity: usize,
    /// Records used by the recency-weighted score
    pub weighted_window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bonus_rule: BonusRule::Linear,
            bonus_divisor: 10.0,
            max_bonus: 0.5,
            hold_stability_bonus: 0.1,
            hold_near_multiplier: 1.5,
            hold_miss_score: 0.3,
            history_capacity: 100,
            weighted_window: 20,
        }
    }
}

impl ScoringConfig {
    fn magnitude_bonus(&self, excess: f64, threshold: f64) -> f64 {
        let raw = match self.bonus_rule {
            BonusRule::Linear => {
                if self.bonus_divisor > 0.0 {
                    excess / self.bonus_divisor
                } else {
                    0.0
                }
            }
            BonusRule::ThresholdRelative => {
                if threshold > 0.0 {
                    excess / (threshold * 2.0)
                } else {
                    self.max_bonus
                }
            }
        };
        raw.max(0.0).min(self.max_bonus.clamp(0.0, MAX_SCORE - 1.0))
    }
}

/// Graduated score of a decision given the realized move (percent) and threshold.
///
/// Always within `[0, MAX_SCORE]`.
pub fn score(config: &ScoringConfig, decision: Decision, change_pct: f64, threshold: f64) -> f64 {
    if change_pct.is_nan() {
        return 0.0;
    }

    let raw = match decision {
        Decision::Buy => {
            if change_pct > threshold {
                1.0 + config.magnitude_bonus(change_pct - threshold, threshold)
            } else if change_pct > 0.0 {
                0.5
            } else {
                0.0
            }
        }
        Decision::Sell => {
            if change_pct < -threshold {
                1.0 + config.magnitude_bonus(change_pct.abs() - threshold, threshold)
            } else if change_pct < 0.0 {
                0.5
            } else {
                0.0
            }
        }
        Decision::Hold => {
            let magnitude = change_pct.abs();
            if magnitude <= threshold {
                let closeness = if threshold > 0.0 {
                    1.0 - magnitude / threshold
                } else {
                    1.0
                };
                1.0 + config.hold_stability_bonus.max(0.0) * closeness
            } else if magnitude <= threshold * config.hold_near_multiplier {
                0.5
            } else {
                config.hold_miss_score
            }
        }
    };

    raw.clamp(0.0, MAX_SCORE)
}

/// Strict correctness: BUY iff move > threshold, SELL iff move < -threshold,
/// HOLD iff |move| <= threshold.
pub fn is_correct(decision: Decision, change_pct: f64, threshold: f64) -> bool {
    match decision {
        Decision::Buy => change_pct > threshold,
        Decision::Sell => change_pct < -threshold,
        Decision::Hold => change_pct.abs() <= threshold,
    }
}

/// Percentage change from `from` to `to`
pub fn price_change_pct(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Owns every model's tracker. One pending decision per model.
pub struct ScoringEngine {
    config: ScoringConfig,
    trackers: BTreeMap<ModelId, ModelTracker>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        let trackers = ModelId::ALL
            .into_iter()
            .map(|m| (m, ModelTracker::new(m, config.history_capacity)))
            .collect();
        Self { config, trackers }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, decision: Decision, change_pct: f64, threshold: f64) -> f64 {
        score(&self.config, decision, change_pct, threshold)
    }

    pub fn is_correct(&self, decision: Decision, change_pct: f64, threshold: f64) -> bool {
        is_correct(decision, change_pct, threshold)
    }

    /// Build a record for `decision` against the realized move without storing it
    pub fn evaluate(
        &self,
        model: ModelId,
        decision: Decision,
        change_pct: f64,
        threshold: f64,
        volatility: f64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> TradeRecord {
        TradeRecord {
            timestamp,
            model,
            decision,
            price_change_pct: change_pct,
            score: self.score(decision, change_pct, threshold),
            threshold,
            volatility,
            price,
            is_correct: self.is_correct(decision, change_pct, threshold),
        }
    }

    /// Append a record to the model's history and bump its counters
    pub fn record_outcome(&mut self, model: ModelId, record: TradeRecord) {
        self.tracker_mut(model).record(record);
    }

    /// Score every pending decision against `price`, consuming them.
    /// An invalid price scores nothing and keeps the pending set.
    pub fn score_pending(
        &mut self,
        price: f64,
        threshold: f64,
        volatility: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<TradeRecord> {
        if !is_valid_price(price) {
            return Vec::new();
        }

        let mut scored = Vec::new();
        for model in ModelId::ALL {
            let Some(pending) = self.tracker(model).pending().copied() else {
                continue;
            };
            if !is_valid_price(pending.price) {
                continue;
            }

            let change = price_change_pct(pending.price, price);
            let record = self.evaluate(
                model,
                pending.decision,
                change,
                threshold,
                volatility,
                price,
                timestamp,
            );
            debug!(
                model = %model,
                decision = %record.decision,
                change_pct = record.price_change_pct,
                score = record.score,
                correct = record.is_correct,
                "scored pending decision"
            );

            let tracker = self.tracker_mut(model);
            tracker.clear_pending();
            tracker.record(record.clone());
            scored.push(record);
        }
        scored
    }

    /// Replace pending decisions with this tick's calls. Absent models have no pending call.
    pub fn set_pending(&mut self, decisions: &DecisionSet, price: f64, timestamp: DateTime<Utc>) {
        for (model, decision) in decisions.iter() {
            let pending = decision.map(|decision| PendingDecision {
                decision,
                price,
                timestamp,
            });
            self.tracker_mut(model).set_pending(pending);
        }
    }

    /// Recent accuracy (%) over the bounded history
    pub fn accuracy_of(&self, model: ModelId) -> f64 {
        self.tracker(model).recent_accuracy()
    }

    /// Cumulative accuracy (%) since session start
    pub fn raw_accuracy_of(&self, model: ModelId) -> f64 {
        self.tracker(model).accuracy().accuracy
    }

    pub fn weighted_score_of(&self, model: ModelId) -> f64 {
        self.tracker(model).weighted_score(self.config.weighted_window)
    }

    pub fn stats_of(&self, model: ModelId) -> ModelStatsSummary {
        self.tracker(model).summary(self.config.weighted_window)
    }

    pub fn tracker(&self, model: ModelId) -> &ModelTracker {
        // every ModelId is inserted in `new`
        &self.trackers[&model]
    }

    pub fn tracker_mut(&mut self, model: ModelId) -> &mut ModelTracker {
        let capacity = self.config.history_capacity;
        self.trackers
            .entry(model)
            .or_insert_with(|| ModelTracker::new(model, capacity))
    }

    pub fn trackers(&self) -> impl Iterator<Item = &ModelTracker> {
        self.trackers.values()
    }

    /// Zero every counter, drop all history and pending calls
    pub fn reset(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.reset();
        }
    }
}
