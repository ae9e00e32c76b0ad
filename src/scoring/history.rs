//! Per-model trade history and accuracy counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Decision, ModelId};

/// A decision scored against a later price. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub model: ModelId,
    pub decision: Decision,
    /// Realized move since the decision, in percent
    pub price_change_pct: f64,
    /// Graduated score (0.0 - 1.5)
    pub score: f64,
    pub threshold: f64,
    pub volatility: f64,
    /// Price the decision was scored against
    pub price: f64,
    pub is_correct: bool,
}

impl TradeRecord {
    /// Correct direction implied by the graduated score
    pub fn score_passed(&self) -> bool {
        self.score >= 1.0
    }
}

/// Most recent unscored call of a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub decision: Decision,
    /// Price at which the call was made
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Cumulative counters since session start
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracyState {
    pub correct: u64,
    pub total: u64,
    /// correct / total * 100
    pub accuracy: f64,
}

impl ModelAccuracyState {
    pub fn record(&mut self, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
        self.recalculate();
    }

    pub fn recalculate(&mut self) {
        self.accuracy = if self.total > 0 {
            self.correct as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
    }
}

/// Display tier for an accuracy percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyRating {
    Good,
    Fair,
    Poor,
}

impl AccuracyRating {
    pub fn from_pct(pct: f64) -> Self {
        if pct >= 65.0 {
            AccuracyRating::Good
        } else if pct >= 45.0 {
            AccuracyRating::Fair
        } else {
            AccuracyRating::Poor
        }
    }
}

impl std::fmt::Display for AccuracyRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccuracyRating::Good => write!(f, "good"),
            AccuracyRating::Fair => write!(f, "fair"),
            AccuracyRating::Poor => write!(f, "poor"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
}

impl DecisionCounts {
    pub fn add(&mut self, decision: Decision) {
        match decision {
            Decision::Buy => self.buy += 1,
            Decision::Sell => self.sell += 1,
            Decision::Hold => self.hold += 1,
        }
    }

    pub fn get(&self, decision: Decision) -> usize {
        match decision {
            Decision::Buy => self.buy,
            Decision::Sell => self.sell,
            Decision::Hold => self.hold,
        }
    }
}

/// Snapshot of a model's performance for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatsSummary {
    pub model: ModelId,
    /// Records in the bounded history
    pub total_trades: usize,
    pub correct_trades: usize,
    pub incorrect_trades: usize,
    pub distribution: DecisionCounts,
    /// Mean realized move of correct trades (0 when none)
    pub avg_correct_change_pct: f64,
    pub recent_accuracy: f64,
    pub raw_accuracy: f64,
    pub weighted_score: f64,
    pub rating: AccuracyRating,
}

/// Pending call, bounded history and counters for one model
#[derive(Debug, Clone)]
pub struct ModelTracker {
    model: ModelId,
    capacity: usize,
    pending: Option<PendingDecision>,
    history: VecDeque<TradeRecord>,
    accuracy: ModelAccuracyState,
}

impl ModelTracker {
    pub fn new(model: ModelId, capacity: usize) -> Self {
        Self {
            model,
            capacity: capacity.max(1),
            pending: None,
            history: VecDeque::new(),
            accuracy: ModelAccuracyState::default(),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn pending(&self) -> Option<&PendingDecision> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, pending: Option<PendingDecision>) {
        self.pending = pending;
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    pub fn history(&self) -> &VecDeque<TradeRecord> {
        &self.history
    }

    pub fn accuracy(&self) -> &ModelAccuracyState {
        &self.accuracy
    }

    /// Append to history (FIFO eviction at capacity) and update counters
    pub fn record(&mut self, record: TradeRecord) {
        self.accuracy.record(record.is_correct);
        self.history.push_back(record);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Percentage of retained records whose score implies a correct call
    pub fn recent_accuracy(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let passed = self.history.iter().filter(|r| r.score_passed()).count();
        passed as f64 / self.history.len() as f64 * 100.0
    }

    /// Recency-weighted mean score of the last `window` records, as a percentage.
    /// The i-th oldest of n records weighs `1 + i/n`.
    pub fn weighted_score(&self, window: usize) -> f64 {
        let n = self.history.len().min(window);
        if n == 0 {
            return 0.0;
        }

        let recent = self.history.iter().skip(self.history.len() - n);
        let (sum, total_weight) = recent.enumerate().fold((0.0, 0.0), |(sum, tw), (i, r)| {
            let w = 1.0 + i as f64 / n as f64;
            (sum + r.score * w, tw + w)
        });
        sum / total_weight * 100.0
    }

    pub fn summary(&self, weighted_window: usize) -> ModelStatsSummary {
        let mut distribution = DecisionCounts::default();
        let mut correct = 0usize;
        let mut correct_change_sum = 0.0;

        for r in &self.history {
            distribution.add(r.decision);
            if r.is_correct {
                correct += 1;
                correct_change_sum += r.price_change_pct;
            }
        }

        let avg_correct_change_pct = if correct > 0 {
            correct_change_sum / correct as f64
        } else {
            0.0
        };
        let recent_accuracy = self.recent_accuracy();

        ModelStatsSummary {
            model: self.model,
            total_trades: self.history.len(),
            correct_trades: correct,
            incorrect_trades: self.history.len() - correct,
            distribution,
            avg_correct_change_pct,
            recent_accuracy,
            raw_accuracy: self.accuracy.accuracy,
            weighted_score: self.weighted_score(weighted_window),
            rating: AccuracyRating::from_pct(recent_accuracy),
        }
    }

    /// Restore persisted state, keeping only the newest `capacity` records
    pub fn restore(
        &mut self,
        accuracy: ModelAccuracyState,
        history: Vec<TradeRecord>,
        pending: Option<PendingDecision>,
    ) {
        let skip = history.len().saturating_sub(self.capacity);
        self.history = history.into_iter().skip(skip).collect();
        self.accuracy = accuracy;
        self.accuracy.recalculate();
        self.pending = pending;
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.history.clear();
        self.accuracy = ModelAccuracyState::default();
    }
}
