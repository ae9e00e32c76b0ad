//! Consensus Engine - Majority vote across the advisory models
//!
//! Needs at least two present votes; a decision wins with two or more.

use serde::{Deserialize, Serialize};

use crate::types::{Decision, DecisionSet, ModelId};

/// Votes needed for consensus (2 of 3)
pub const MIN_AGREEING: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
    /// Models that produced a decision
    pub present: usize,
}

impl VoteTally {
    pub fn votes_for(&self, decision: Decision) -> usize {
        match decision {
            Decision::Buy => self.buy,
            Decision::Sell => self.sell,
            Decision::Hold => self.hold,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusEngine;

impl ConsensusEngine {
    pub fn tally(decisions: &DecisionSet) -> VoteTally {
        let mut tally = VoteTally::default();
        for (_, decision) in decisions.present() {
            tally.present += 1;
            match decision {
                Decision::Buy => tally.buy += 1,
                Decision::Sell => tally.sell += 1,
                Decision::Hold => tally.hold += 1,
            }
        }
        tally
    }

    /// Majority decision, or `None` with fewer than two present votes or no majority
    pub fn consensus(decisions: &DecisionSet) -> Option<Decision> {
        let tally = Self::tally(decisions);
        if tally.present < MIN_AGREEING {
            return None;
        }

        // with three voters at most one decision can reach two votes
        Decision::ALL
            .into_iter()
            .find(|d| tally.votes_for(*d) >= MIN_AGREEING)
    }
}

/// Models whose decision equals `action`
pub fn agreeing_models(decisions: &DecisionSet, action: Decision) -> Vec<ModelId> {
    decisions
        .present()
        .filter(|(_, d)| *d == action)
        .map(|(m, _)| m)
        .collect()
}
