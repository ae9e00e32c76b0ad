//! Volatility Tracker - Rolling price window and return dispersion
//!
//! Keeps the most recent `window_hours * samples_per_hour` prices (FIFO) and
//! reports volatility as a percentage of successive simple returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::errors::EngineError;
use crate::types::{is_valid_price, PriceSample};

/// How successive returns are collapsed into one statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityEstimator {
    /// Population standard deviation around the mean return
    StdDev,
    /// Root mean square of returns (no mean subtraction)
    Rms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Time span covered by the window
    pub window_hours: usize,
    /// Ingestion cadence (ticks per hour)
    pub samples_per_hour: usize,
    pub estimator: VolatilityEstimator,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            samples_per_hour: 60, // one tick per minute
            estimator: VolatilityEstimator::StdDev,
        }
    }
}

impl VolatilityConfig {
    /// Window capacity in samples; never below 2 so a return can exist
    pub fn capacity(&self) -> usize {
        self.window_hours.saturating_mul(self.samples_per_hour).max(2)
    }
}

pub struct VolatilityTracker {
    config: VolatilityConfig,
    samples: VecDeque<PriceSample>,
}

impl VolatilityTracker {
    pub fn new(config: VolatilityConfig) -> Self {
        let capacity = config.capacity();
        Self {
            config,
            samples: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Append a price, evicting the oldest sample once the window is full.
    /// Non-positive or non-finite prices are rejected and leave the window untouched.
    pub fn record(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        if !is_valid_price(price) {
            return Err(EngineError::InvalidPrice { price });
        }

        self.samples.push_back(PriceSample::new(price, timestamp));

        let capacity = self.config.capacity();
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
        Ok(())
    }

    /// Percentage volatility of successive returns; 0 with fewer than 2 samples
    pub fn current(&self) -> f64 {
        let prices: Vec<f64> = self.samples.iter().map(|s| s.price).collect();
        volatility_pct(&prices, self.config.estimator)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PriceSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Simple returns `(p[i] - p[i-1]) / p[i-1]` over adjacent pairs
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Volatility in percent for a price series
pub fn volatility_pct(prices: &[f64], estimator: VolatilityEstimator) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let returns = simple_returns(prices);
    let n = returns.len() as f64;

    let variance = match estimator {
        VolatilityEstimator::StdDev => {
            let mean = returns.iter().sum::<f64>() / n;
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
        }
        VolatilityEstimator::Rms => returns.iter().map(|r| r * r).sum::<f64>() / n,
    };

    variance.sqrt() * 100.0
}
