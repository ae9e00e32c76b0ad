//! Host-only configuration sections
//!
//! Engine sections (volatility, threshold, ...) are the library's own config
//! structs; these cover what only the replay host needs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Engine state snapshot, relative to `data_dir`
    pub state_file: String,
    /// Scored trade records CSV, relative to `data_dir`
    pub trade_log_file: String,
    /// Enable CSV trade log
    pub csv_enabled: bool,
}

impl PersistenceConfig {
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.state_file)
    }

    pub fn trade_log_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.trade_log_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// CSV of ticks to replay
    pub ticks_file: String,
    /// Delay between ticks; 0 replays as fast as possible
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directives used when RUST_LOG is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "stbchef=info,warn".to_string(),
            json: false,
        }
    }
}
