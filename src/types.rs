//! Core types used throughout the engine
//!
//! Defines the advisory models, their decisions, market regime and price samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// Advisory models feeding the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    Gemini,
    Groq,
    Mistral,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Gemini, ModelId::Groq, ModelId::Mistral];

    /// Storage / wire key (lowercase)
    pub fn key(&self) -> &'static str {
        match self {
            ModelId::Gemini => "gemini",
            ModelId::Groq => "groq",
            ModelId::Mistral => "mistral",
        }
    }

    /// Name shown next to an attributed recommendation
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::Gemini => "Gemini",
            ModelId::Groq => "Groq",
            ModelId::Mistral => "Mistral",
        }
    }

    /// Parse from string
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Some(ModelId::Gemini),
            "groq" => Some(ModelId::Groq),
            "mistral" => Some(ModelId::Mistral),
            _ => None,
        }
    }
}

impl FromStr for ModelId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EngineError::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Trading decision emitted by a model
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Buy, Decision::Sell, Decision::Hold];

    /// Parse from string (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Some(Decision::Buy),
            "SELL" => Some(Decision::Sell),
            "HOLD" => Some(Decision::Hold),
            _ => None,
        }
    }

    /// BUY and SELL move the portfolio; HOLD does not
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Decision::Hold)
    }
}

impl FromStr for Decision {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EngineError::UnknownDecision(s.to_string()))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

/// Market regime supplied by the sentiment indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bullish,
    #[default]
    Bearish,
}

impl MarketRegime {
    /// Fear & Greed index above 50 reads as bullish, anything else bearish
    pub fn from_fear_greed(value: u32) -> Self {
        if value > 50 {
            MarketRegime::Bullish
        } else {
            MarketRegime::Bearish
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, MarketRegime::Bullish)
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bullish => write!(f, "bullish"),
            MarketRegime::Bearish => write!(f, "bearish"),
        }
    }
}

/// Latest decision of each model for one tick. `None` means no data yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSet {
    pub gemini: Option<Decision>,
    pub groq: Option<Decision>,
    pub mistral: Option<Decision>,
}

impl DecisionSet {
    pub fn new(
        gemini: Option<Decision>,
        groq: Option<Decision>,
        mistral: Option<Decision>,
    ) -> Self {
        Self {
            gemini,
            groq,
            mistral,
        }
    }

    pub fn get(&self, model: ModelId) -> Option<Decision> {
        match model {
            ModelId::Gemini => self.gemini,
            ModelId::Groq => self.groq,
            ModelId::Mistral => self.mistral,
        }
    }

    pub fn set(&mut self, model: ModelId, decision: Option<Decision>) {
        match model {
            ModelId::Gemini => self.gemini = decision,
            ModelId::Groq => self.groq = decision,
            ModelId::Mistral => self.mistral = decision,
        }
    }

    /// Iterate over every model, present or not, in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, Option<Decision>)> + '_ {
        ModelId::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    /// Only the models that produced a decision
    pub fn present(&self) -> impl Iterator<Item = (ModelId, Decision)> + '_ {
        self.iter().filter_map(|(m, d)| d.map(|d| (m, d)))
    }

    pub fn present_count(&self) -> usize {
        self.present().count()
    }
}

/// Timestamped price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}

/// A price is usable only when it is finite and strictly positive
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
