//! Persistence - Engine state snapshots, trade log and replay tick reader
//!
//! The engine itself never performs I/O. This module gives the host:
//! - `EngineState`: serializable snapshot of accuracy, histories and pending calls
//! - `StateStore` / `JsonFileStore`: where snapshots live between runs
//! - `TradeLog`: append-only CSV of scored trade records
//! - `read_ticks_csv`: tick source for the replay host

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{EngineContext, TickInput};
use crate::errors::EngineError;
use crate::rebalance::PortfolioSnapshot;
use crate::scoring::{ModelAccuracyState, PendingDecision, TradeRecord};
use crate::session::regime_from_sentiment;
use crate::types::{Decision, DecisionSet, ModelId};

/// Bumped whenever the snapshot layout changes incompatibly
pub const STATE_VERSION: &str = "1";

// ─────────────────────────────────────────────────────────────────
// Engine state snapshot
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub accuracy: ModelAccuracyState,
    #[serde(default)]
    pub history: Vec<TradeRecord>,
    #[serde(default)]
    pub pending: Option<PendingDecision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    /// Last evaluated tick, used to detect a fresh session
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub models: BTreeMap<ModelId, ModelState>,
}

impl EngineState {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Key-value store the host persists snapshots in
#[cfg_attr(test, mockall::automock)]
pub trait StateStore {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<EngineState>, EngineError>;
    fn save(&self, state: &EngineState) -> Result<(), EngineError>;
    fn clear(&self) -> Result<(), EngineError>;
}

/// Snapshot stored as pretty JSON in a single file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<EngineState>, EngineError> {
        if !self.path.exists() {
            info!("📂 No previous engine state found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        let state = EngineState::from_json(&json)?;
        info!(
            "📂 Engine state loaded from {} (version {})",
            self.path.display(),
            state.version
        );
        Ok(Some(state))
    }

    fn save(&self, state: &EngineState) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // write-then-rename so a crash never leaves a truncated snapshot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, state.to_json()?)?;
        fs::rename(&tmp, &self.path)?;

        info!("💾 Engine state saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), EngineError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("🧹 Engine state cleared ({})", self.path.display());
        }
        Ok(())
    }
}

/// Load persisted state into `engine`, then apply the fresh-session rule.
///
/// Unreadable or incompatible state is logged and ignored. Returns true when a
/// fresh session was started.
pub fn resume_engine(
    engine: &mut EngineContext,
    store: &dyn StateStore,
    now: DateTime<Utc>,
) -> bool {
    match store.load() {
        Ok(Some(state)) => {
            if let Err(e) = engine.restore(state) {
                warn!("Discarding persisted engine state: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to load engine state: {}, starting fresh", e),
    }

    engine.ensure_session(now)
}

// ─────────────────────────────────────────────────────────────────
// Trade log (CSV)
// ─────────────────────────────────────────────────────────────────

/// One CSV row per scored trade record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogRow {
    pub timestamp: String,
    pub model: String,
    pub decision: String,
    pub price_change_pct: f64,
    pub score: f64,
    pub threshold: f64,
    pub volatility: f64,
    pub price: f64,
    pub is_correct: bool,
}

impl From<&TradeRecord> for TradeLogRow {
    fn from(record: &TradeRecord) -> Self {
        Self {
            timestamp: record.timestamp.to_rfc3339(),
            model: record.model.key().to_string(),
            decision: record.decision.to_string(),
            price_change_pct: record.price_change_pct,
            score: record.score,
            threshold: record.threshold,
            volatility: record.volatility,
            price: record.price,
            is_correct: record.is_correct,
        }
    }
}

pub struct TradeLog {
    writer: csv::Writer<File>,
}

impl TradeLog {
    /// Open for append; the header is written only when the file is new or empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file_has_data = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(Self { writer })
    }

    pub fn append(&mut self, records: &[TradeRecord]) -> Result<(), EngineError> {
        for record in records {
            self.writer.serialize(TradeLogRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Replay ticks (CSV)
// ─────────────────────────────────────────────────────────────────

/// Raw replay row. Empty decision cells mean the model had no call yet.
#[derive(Debug, Clone, Deserialize)]
pub struct TickRow {
    pub timestamp: String,
    pub price: Option<f64>,
    pub gemini: Option<String>,
    pub groq: Option<String>,
    pub mistral: Option<String>,
    pub eth_balance: Option<f64>,
    pub usdc_balance: Option<f64>,
    pub fear_greed: Option<u32>,
}

impl TickRow {
    /// Convert to engine input. A missing price becomes NaN so the engine skips the tick.
    pub fn into_input(self) -> Result<TickInput, EngineError> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let price = self.price.unwrap_or(f64::NAN);

        let decisions = DecisionSet::new(
            parse_decision(self.gemini.as_deref())?,
            parse_decision(self.groq.as_deref())?,
            parse_decision(self.mistral.as_deref())?,
        );

        let mut input = TickInput::new(price, timestamp, decisions);
        if let (Some(eth), Some(usdc)) = (self.eth_balance, self.usdc_balance) {
            input = input.with_portfolio(
                PortfolioSnapshot::new(eth, usdc, price),
                regime_from_sentiment(self.fear_greed),
            );
        }
        Ok(input)
    }
}

fn parse_decision(cell: Option<&str>) -> Result<Option<Decision>, EngineError> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<Decision>().map(Some),
    }
}

/// RFC 3339, `%Y-%m-%d %H:%M:%S` (UTC) or unix seconds
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| EngineError::InvalidTimestamp(raw.to_string()))
}

pub fn parse_ticks<R: Read>(reader: R) -> Result<Vec<TickInput>, EngineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut ticks = Vec::new();
    for row in reader.deserialize::<TickRow>() {
        ticks.push(row?.into_input()?);
    }
    Ok(ticks)
}

/// Columns: `timestamp,price,gemini,groq,mistral,eth_balance,usdc_balance,fear_greed`
pub fn read_ticks_csv(path: impl AsRef<Path>) -> Result<Vec<TickInput>, EngineError> {
    let file = File::open(path.as_ref())?;
    parse_ticks(file)
}
