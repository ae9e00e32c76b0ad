//! Session lifecycle
//!
//! A session ends after a configurable period of inactivity. The host persists
//! the last activity timestamp and asks on startup whether a fresh session has
//! begun, in which case all accuracy and history state is discarded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MarketRegime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub inactivity_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_hours: 24,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    inactivity: Duration,
    last_activity: Option<DateTime<Utc>>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionClock {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inactivity: Duration::hours(config.inactivity_hours.max(0)),
            last_activity: None,
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// Restore the persisted timestamp
    pub fn set_last_activity(&mut self, at: Option<DateTime<Utc>>) {
        self.last_activity = at;
    }

    /// No recorded activity, or the gap since it exceeds the inactivity window
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity {
            Some(last) => now.signed_duration_since(last) > self.inactivity,
            None => true,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        // replayed ticks may arrive out of order; never move the clock back
        match self.last_activity {
            Some(last) if last >= now => {}
            _ => self.last_activity = Some(now),
        }
    }
}

/// Regime from an optional Fear & Greed reading. Missing data reads as bearish.
pub fn regime_from_sentiment(fear_greed: Option<u32>) -> MarketRegime {
    fear_greed
        .map(MarketRegime::from_fear_greed)
        .unwrap_or_default()
}
