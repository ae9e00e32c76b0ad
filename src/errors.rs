use thiserror::Error;

/// Typed error hierarchy for the engine.
///
/// Kernel operations never fail fatally; these surface at the input boundary
/// (bad prices, unparsable model names) and in snapshot/CSV handling. Host code
/// wraps them with `anyhow::Context`.
#[derive(Error, Debug)]
pub enum EngineError {
    // -- Input --------------------------------------------------------------
    #[error("invalid price input: {price}")]
    InvalidPrice { price: f64 },

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("unknown decision: {0}")]
    UnknownDecision(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // -- State --------------------------------------------------------------
    #[error("unsupported state version {found} (expected {expected})")]
    UnsupportedStateVersion { found: String, expected: String },

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a tick was withheld instead of evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Price was NaN, infinite, zero or negative.
    InvalidPrice(f64),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidPrice(p) => write!(f, "invalid_price({})", p),
        }
    }
}
