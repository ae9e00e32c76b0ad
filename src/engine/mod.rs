//! Engine Context - Per-tick evaluation pipeline
//!
//! Owns every piece of rolling state (price window, per-model trackers,
//! throttle timestamps, session clock). The host serializes ticks and feeds
//! each one through [`EngineContext::on_tick`]:
//!
//! volatility -> threshold -> score pending calls -> consensus -> rebalance -> notify gate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consensus::ConsensusEngine;
use crate::errors::{EngineError, SkipReason};
use crate::notification::{AlertContext, NotificationConfig, NotificationGate};
use crate::persistence::{EngineState, ModelState, STATE_VERSION};
use crate::rebalance::{PortfolioRebalancer, PortfolioSnapshot, RebalanceConfig, RebalanceDecision};
use crate::scoring::{ScoringConfig, ScoringEngine, TradeRecord};
use crate::session::{SessionClock, SessionConfig};
use crate::threshold::{ThresholdConfig, ThresholdPolicy};
use crate::types::{Decision, DecisionSet, MarketRegime, ModelId};
use crate::volatility::{VolatilityConfig, VolatilityTracker};

/// Library-side configuration; the host projects its file config into this
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub volatility: VolatilityConfig,
    pub threshold: ThresholdConfig,
    pub scoring: ScoringConfig,
    pub rebalance: RebalanceConfig,
    pub notification: NotificationConfig,
    pub session: SessionConfig,
}

// ─────────────────────────────────────────────────────────────────
// Tick input / output
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// This tick's model calls; they become the pending set scored on the next tick
    pub decisions: DecisionSet,
    /// Balances at this tick, when the wallet provider has them
    pub portfolio: Option<PortfolioSnapshot>,
    pub regime: MarketRegime,
}

impl TickInput {
    pub fn new(price: f64, timestamp: DateTime<Utc>, decisions: DecisionSet) -> Self {
        Self {
            price,
            timestamp,
            decisions,
            portfolio: None,
            regime: MarketRegime::default(),
        }
    }

    pub fn with_portfolio(mut self, snapshot: PortfolioSnapshot, regime: MarketRegime) -> Self {
        self.portfolio = Some(snapshot);
        self.regime = regime;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volatility: f64,
    pub threshold: f64,
    /// Previous tick's calls scored against this price
    pub scored: Vec<TradeRecord>,
    pub consensus: Option<Decision>,
    pub rebalance: Option<RebalanceDecision>,
    /// Host should surface an alert for `rebalance`
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Withheld; no state was touched
    Skipped(SkipReason),
    Evaluated(TickReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Evaluated(report) => Some(report),
            TickOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped(_))
    }
}

// ─────────────────────────────────────────────────────────────────
// Engine context
// ─────────────────────────────────────────────────────────────────

pub struct EngineContext {
    volatility: VolatilityTracker,
    threshold: ThresholdPolicy,
    scoring: ScoringEngine,
    rebalancer: PortfolioRebalancer,
    gate: NotificationGate,
    session: SessionClock,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            volatility: VolatilityTracker::new(config.volatility),
            threshold: ThresholdPolicy::new(config.threshold),
            scoring: ScoringEngine::new(config.scoring),
            rebalancer: PortfolioRebalancer::new(config.rebalance),
            gate: NotificationGate::new(config.notification),
            session: SessionClock::new(config.session),
        }
    }

    /// Run one tick through the full pipeline
    pub fn on_tick(&mut self, input: TickInput) -> TickOutcome {
        let TickInput {
            price,
            timestamp,
            decisions,
            portfolio,
            regime,
        } = input;

        // the window validates before mutating, so a rejection leaves everything untouched
        if let Err(err) = self.volatility.record(price, timestamp) {
            warn!("⚠️ Skipping tick: {}", err);
            return TickOutcome::Skipped(SkipReason::InvalidPrice(price));
        }

        let volatility = self.volatility.current();
        let threshold = self.threshold.threshold_for(volatility);

        let scored = self
            .scoring
            .score_pending(price, threshold, volatility, timestamp);
        self.scoring.set_pending(&decisions, price, timestamp);

        let consensus = ConsensusEngine::consensus(&decisions);

        let rebalance = portfolio
            .map(|snapshot| self.rebalancer.decide(&snapshot, regime, consensus, &decisions));

        let notify = match &rebalance {
            Some(decision) => self.gate_decision(decision, timestamp),
            None => false,
        };

        self.session.touch(timestamp);

        debug!(
            price,
            volatility,
            threshold,
            scored = scored.len(),
            consensus = ?consensus,
            action = ?rebalance.as_ref().map(|r| r.action),
            notify,
            "tick evaluated"
        );

        TickOutcome::Evaluated(TickReport {
            timestamp,
            price,
            volatility,
            threshold,
            scored,
            consensus,
            rebalance,
            notify,
        })
    }

    fn gate_decision(&mut self, decision: &RebalanceDecision, now: DateTime<Utc>) -> bool {
        // a zero-size swap is a no-op and must not consume the throttle slot
        if decision.amount <= 0.0 {
            return false;
        }

        let ctx = AlertContext {
            allocation_out_of_range: decision.is_out_of_range(),
            agreeing_models: decision.agreeing_models.len(),
        };
        if !self.gate.should_notify(decision.action, now, ctx) {
            return false;
        }

        self.gate.record_notified(decision.action, now);
        info!(
            "🔔 {} {:.4} {} ({}) reason={} models=[{}]",
            decision.action,
            decision.amount,
            decision.unit,
            decision.direction,
            decision.reason,
            decision.agreeing_names().join(", ")
        );
        true
    }

    // ── Session lifecycle ───────────────────────────────────────

    /// Reset all accuracy state when a fresh session has begun. Returns whether it did.
    pub fn ensure_session(&mut self, now: DateTime<Utc>) -> bool {
        if !self.session.is_fresh(now) {
            return false;
        }

        match self.session.last_activity() {
            Some(last) => info!(
                "🆕 Fresh session: inactive since {}, resetting model accuracy",
                last.to_rfc3339()
            ),
            None => info!("🆕 Fresh session: no previous activity"),
        }
        self.reset_session();
        self.session.touch(now);
        true
    }

    /// Drop every counter, history, pending call, price sample and throttle timestamp
    pub fn reset_session(&mut self) {
        self.scoring.reset();
        self.volatility.clear();
        self.gate.reset();
        self.session.set_last_activity(None);
    }

    // ── Snapshot / restore ──────────────────────────────────────

    pub fn snapshot(&self) -> EngineState {
        let models = self
            .scoring
            .trackers()
            .map(|t| {
                (
                    t.model(),
                    ModelState {
                        accuracy: *t.accuracy(),
                        history: t.history().iter().cloned().collect(),
                        pending: t.pending().copied(),
                    },
                )
            })
            .collect();

        EngineState {
            version: STATE_VERSION.to_string(),
            saved_at: Utc::now(),
            last_activity: self.session.last_activity(),
            models,
        }
    }

    /// Load persisted accuracy, histories and pending calls.
    /// Price window and throttle timestamps are not persisted and start empty.
    pub fn restore(&mut self, state: EngineState) -> Result<(), EngineError> {
        if state.version != STATE_VERSION {
            return Err(EngineError::UnsupportedStateVersion {
                found: state.version,
                expected: STATE_VERSION.to_string(),
            });
        }

        self.scoring.reset();
        for (model, model_state) in state.models {
            self.scoring.tracker_mut(model).restore(
                model_state.accuracy,
                model_state.history,
                model_state.pending,
            );
        }
        self.session.set_last_activity(state.last_activity);

        info!(
            "📂 Restored engine state saved at {} ({} records)",
            state.saved_at.to_rfc3339(),
            self.scoring
                .trackers()
                .map(|t| t.history().len())
                .sum::<usize>()
        );
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn volatility(&self) -> &VolatilityTracker {
        &self.volatility
    }

    pub fn threshold_policy(&self) -> &ThresholdPolicy {
        &self.threshold
    }

    pub fn rebalancer(&self) -> &PortfolioRebalancer {
        &self.rebalancer
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn session(&self) -> &SessionClock {
        &self.session
    }

    pub fn accuracy_of(&self, model: ModelId) -> f64 {
        self.scoring.accuracy_of(model)
    }

    pub fn raw_accuracy_of(&self, model: ModelId) -> f64 {
        self.scoring.raw_accuracy_of(model)
    }
}
