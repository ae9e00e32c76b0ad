//! Threshold Policy - "significant move" band derived from volatility
//!
//! Calm markets make small moves meaningful; turbulent markets need a wider
//! band before a call is judged right or wrong.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// <1% -> 0.8x, 1-3% -> 1x, 3-5% -> 1.5x, >=5% -> 2x base
    Banded,
    /// base * clamp(volatility, 0.5, 2.0)
    Scaled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub mode: ThresholdMode,
    /// Base threshold in percentage points
    pub base: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Banded,
            base: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: ThresholdConfig,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}

impl ThresholdPolicy {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn base(&self) -> f64 {
        self.config.base
    }

    /// Threshold (percentage points) for a volatility reading (percent).
    /// Monotonically non-decreasing in `volatility`.
    pub fn threshold_for(&self, volatility: f64) -> f64 {
        let base = self.config.base;
        // NaN volatility is treated as calm
        let vol = if volatility.is_nan() { 0.0 } else { volatility };

        match self.config.mode {
            ThresholdMode::Banded => {
                let factor = if vol < 1.0 {
                    0.8
                } else if vol < 3.0 {
                    1.0
                } else if vol < 5.0 {
                    1.5
                } else {
                    2.0
                };
                base * factor
            }
            ThresholdMode::Scaled => base * vol.clamp(0.5, 2.0),
        }
    }
}
