//! Replay driver - feeds recorded ticks through the engine on a tokio interval
//!
//! Host-side only; the engine stays synchronous. Each tick is awaited so a
//! Ctrl-C racing the replay can stop it between ticks.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::{EngineContext, TickInput, TickOutcome};
use crate::persistence::TradeLog;
use crate::types::ModelId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub scored: usize,
    pub alerts: usize,
}

/// Run `ticks` in order, accumulating into `summary` as it goes so an
/// interrupted replay still reports what it did.
pub async fn run_replay(
    engine: &mut EngineContext,
    ticks: Vec<TickInput>,
    tick_interval_ms: u64,
    mut trade_log: Option<&mut TradeLog>,
    summary: &mut ReplaySummary,
) -> Result<()> {
    let mut interval = (tick_interval_ms > 0)
        .then(|| tokio::time::interval(Duration::from_millis(tick_interval_ms)));

    for tick in ticks {
        match interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        let report = match engine.on_tick(tick) {
            TickOutcome::Skipped(reason) => {
                summary.skipped += 1;
                debug!(%reason, "tick skipped");
                continue;
            }
            TickOutcome::Evaluated(report) => report,
        };

        summary.evaluated += 1;
        summary.scored += report.scored.len();

        if let Some(log) = trade_log.as_deref_mut() {
            log.append(&report.scored)
                .context("Failed to append trade records")?;
        }

        if report.notify {
            summary.alerts += 1;
            if let Some(decision) = &report.rebalance {
                info!(
                    at = %report.timestamp,
                    price = report.price,
                    action = %decision.action,
                    amount = decision.amount,
                    unit = %decision.unit,
                    allocation_pct = decision.allocation_pct,
                    "📣 Alert"
                );
            }
        }
    }

    Ok(())
}

/// Per-model accuracy lines for the end-of-run log
pub fn log_model_stats(engine: &EngineContext) {
    for model in ModelId::ALL {
        let stats = engine.scoring().stats_of(model);
        if stats.total_trades == 0 {
            warn!("{}: no scored calls", model.display_name());
            continue;
        }
        info!(
            "📊 {}: recent {:.1}% ({}) | raw {:.1}% | weighted {:.1} | {} BUY / {} SELL / {} HOLD",
            model.display_name(),
            stats.recent_accuracy,
            stats.rating,
            stats.raw_accuracy,
            stats.weighted_score,
            stats.distribution.buy,
            stats.distribution.sell,
            stats.distribution.hold,
        );
    }
}
