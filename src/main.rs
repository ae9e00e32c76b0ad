//! Replay host
//!
//! Loads persisted engine state, replays recorded ticks from CSV and saves the
//! state again on completion or Ctrl-C.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use stbchef::config::AppConfig;
use stbchef::logging;
use stbchef::persistence::{read_ticks_csv, resume_engine, JsonFileStore, StateStore, TradeLog};
use stbchef::replay::{log_model_stats, run_replay, ReplaySummary};
use stbchef::EngineContext;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_tracing(&config.logging)?;

    info!("🚀 stbchef v{} starting replay", env!("CARGO_PKG_VERSION"));
    info!("⚙️ {}", config);

    let ticks = read_ticks_csv(&config.replay.ticks_file)
        .with_context(|| format!("Failed to read ticks from {}", config.replay.ticks_file))?;
    info!("📈 Loaded {} ticks from {}", ticks.len(), config.replay.ticks_file);

    let store = JsonFileStore::new(config.persistence.state_path());
    let mut engine = EngineContext::new(config.engine_config());

    // session freshness is judged at the first replayed tick, not wall-clock time
    let session_start = ticks.first().map(|t| t.timestamp).unwrap_or_else(Utc::now);
    if resume_engine(&mut engine, &store, session_start) {
        info!("🆕 Starting a fresh session");
    }

    let mut trade_log = if config.persistence.csv_enabled {
        Some(
            TradeLog::open(config.persistence.trade_log_path())
                .context("Failed to open trade log")?,
        )
    } else {
        None
    };

    let mut summary = ReplaySummary::default();
    tokio::select! {
        result = run_replay(
            &mut engine,
            ticks,
            config.replay.tick_interval_ms,
            trade_log.as_mut(),
            &mut summary,
        ) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 Ctrl-C received, stopping replay");
        }
    }

    info!(
        "🏁 Replay finished: {} evaluated, {} skipped, {} calls scored, {} alerts",
        summary.evaluated, summary.skipped, summary.scored, summary.alerts
    );
    log_model_stats(&engine);

    store
        .save(&engine.snapshot())
        .context("Failed to save engine state")?;

    Ok(())
}
