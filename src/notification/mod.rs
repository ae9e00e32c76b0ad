//! Notification Gate - Debounces outbound alerts per action type
//!
//! Throttles attempts, not deliveries: whether the transport succeeded has no
//! bearing on the next verdict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::consensus::MIN_AGREEING;
use crate::types::Decision;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum gap between two alerts of the same action type
    pub min_interval_secs: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 300,
        }
    }
}

/// Why an alert for this action would be worth the user's attention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertContext {
    /// ETH allocation is outside the target band
    pub allocation_out_of_range: bool,
    /// Models whose decision equals the action
    pub agreeing_models: usize,
}

pub struct NotificationGate {
    min_interval: Duration,
    last_notified: HashMap<Decision, DateTime<Utc>>,
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

impl NotificationGate {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            min_interval: Duration::seconds(config.min_interval_secs.max(0)),
            last_notified: HashMap::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// True iff the action is BUY/SELL, the interval since the last alert of that
    /// type has elapsed, and either the allocation is off-band or two models agree.
    pub fn should_notify(&self, action: Decision, now: DateTime<Utc>, ctx: AlertContext) -> bool {
        if !action.is_actionable() {
            return false;
        }

        let warranted = ctx.allocation_out_of_range || ctx.agreeing_models >= MIN_AGREEING;
        if !warranted {
            return false;
        }

        match self.last_notified.get(&action) {
            Some(last) => now.signed_duration_since(*last) >= self.min_interval,
            None => true,
        }
    }

    /// Call exactly once per emitted alert
    pub fn record_notified(&mut self, action: Decision, now: DateTime<Utc>) {
        self.last_notified.insert(action, now);
    }

    pub fn last_notified(&self, action: Decision) -> Option<DateTime<Utc>> {
        self.last_notified.get(&action).copied()
    }

    pub fn reset(&mut self) {
        self.last_notified.clear();
    }
}
