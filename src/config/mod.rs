//! Configuration management for STBChef
//!
//! Loads from TOML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::notification::NotificationConfig;
use crate::rebalance::RebalanceConfig;
use crate::scoring::ScoringConfig;
use crate::session::SessionConfig;
use crate::threshold::ThresholdConfig;
use crate::volatility::VolatilityConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub volatility: VolatilityConfig,
    pub threshold: ThresholdConfig,
    pub scoring: ScoringConfig,
    pub rebalance: RebalanceConfig,
    pub notification: NotificationConfig,
    pub session: SessionConfig,
    pub persistence: PersistenceConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Volatility defaults
            .set_default("volatility.window_hours", 24)?
            .set_default("volatility.samples_per_hour", 60)?
            .set_default("volatility.estimator", "std_dev")?
            // Threshold defaults
            .set_default("threshold.mode", "banded")?
            .set_default("threshold.base", 0.5)?
            // Scoring defaults
            .set_default("scoring.bonus_rule", "linear")?
            .set_default("scoring.bonus_divisor", 10.0)?
            .set_default("scoring.max_bonus", 0.5)?
            .set_default("scoring.hold_stability_bonus", 0.1)?
            .set_default("scoring.hold_near_multiplier", 1.5)?
            .set_default("scoring.hold_miss_score", 0.3)?
            .set_default("scoring.history_capacity", 100)?
            .set_default("scoring.weighted_window", 20)?
            // Rebalance defaults
            .set_default("rebalance.bearish_min", 20.0)?
            .set_default("rebalance.bearish_max", 40.0)?
            .set_default("rebalance.bullish_min", 60.0)?
            .set_default("rebalance.bullish_max", 80.0)?
            .set_default("rebalance.severe_slack", 10.0)?
            .set_default("rebalance.dust_usd", 0.10)?
            // Notification defaults
            .set_default("notification.min_interval_secs", 300)?
            // Session defaults
            .set_default("session.inactivity_hours", 24)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.state_file", "engine_state.json")?
            .set_default("persistence.trade_log_file", "trades.csv")?
            .set_default("persistence.csv_enabled", true)?
            // Replay defaults
            .set_default("replay.ticks_file", "./data/ticks.csv")?
            .set_default("replay.tick_interval_ms", 0)?
            // Logging defaults
            .set_default("logging.filter", "stbchef=info,warn")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (STBCHEF__SECTION__KEY)
            .add_source(Environment::with_prefix("STBCHEF").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let r = &self.rebalance;
        for (name, min, max) in [
            ("bearish", r.bearish_min, r.bearish_max),
            ("bullish", r.bullish_min, r.bullish_max),
        ] {
            if !(0.0..=100.0).contains(&min) || !(0.0..=100.0).contains(&max) || min > max {
                bail!(
                    "rebalance.{name} band must satisfy 0 <= min <= max <= 100 (got {min}..{max})"
                );
            }
        }
        if r.severe_slack < 0.0 || r.dust_usd < 0.0 {
            bail!("rebalance.severe_slack and rebalance.dust_usd must be non-negative");
        }
        if !(self.threshold.base > 0.0) {
            bail!("threshold.base must be positive (got {})", self.threshold.base);
        }
        if self.scoring.history_capacity == 0 {
            bail!("scoring.history_capacity must be at least 1");
        }
        if self.notification.min_interval_secs < 0 || self.session.inactivity_hours < 0 {
            bail!("notification and session intervals must be non-negative");
        }
        Ok(())
    }

    /// Project onto the library's engine configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            volatility: self.volatility.clone(),
            threshold: self.threshold.clone(),
            scoring: self.scoring.clone(),
            rebalance: self.rebalance.clone(),
            notification: self.notification.clone(),
            session: self.session.clone(),
        }
    }

    /// One-line summary for the startup log
    pub fn digest(&self) -> String {
        format!(
            "window={}h x {}/h estimator={:?} threshold={:?}@{:.2} bonus={:?} hold_miss={:.2} \
             bands=[{}-{}|{}-{}] notify_every={}s",
            self.volatility.window_hours,
            self.volatility.samples_per_hour,
            self.volatility.estimator,
            self.threshold.mode,
            self.threshold.base,
            self.scoring.bonus_rule,
            self.scoring.hold_miss_score,
            self.rebalance.bearish_min,
            self.rebalance.bearish_max,
            self.rebalance.bullish_min,
            self.rebalance.bullish_max,
            self.notification.min_interval_secs,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
