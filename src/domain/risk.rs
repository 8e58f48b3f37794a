//! Risk level and the regulation parameters the engine reads before every trade.

use serde::{Deserialize, Serialize};

/// Current regulation level.
///
/// Levels are deliberately not ordered: transitions follow the explicit
/// table in [`crate::regulation::state_machine`], never a numeric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// All parameters at their configured values
    Normal,
    /// Loss streak reached the trigger; thresholds tightened one step
    Cautious,
    /// Loss streak reached the emergency threshold; conservative settings forced
    Emergency,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Cautious => "cautious",
            RiskLevel::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signal filtering thresholds consumed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegulationParams {
    /// Minimum signal confidence required to open a trade
    pub min_confidence_threshold: f64,
    /// Minimum number of agreeing strategies (confluence)
    pub min_strategies_for_signal: u32,
}

impl RegulationParams {
    pub fn new(min_confidence_threshold: f64, min_strategies_for_signal: u32) -> Self {
        Self {
            min_confidence_threshold,
            min_strategies_for_signal,
        }
    }

    /// Clamp both dimensions into the configured floor/ceiling
    pub fn clamped(self, bounds: &ParamBounds) -> Self {
        Self {
            min_confidence_threshold: self
                .min_confidence_threshold
                .clamp(bounds.min_confidence, bounds.max_confidence),
            min_strategies_for_signal: self
                .min_strategies_for_signal
                .clamp(bounds.min_strategies, bounds.max_strategies),
        }
    }

    pub fn within(&self, bounds: &ParamBounds) -> bool {
        (bounds.min_confidence..=bounds.max_confidence).contains(&self.min_confidence_threshold)
            && (bounds.min_strategies..=bounds.max_strategies)
                .contains(&self.min_strategies_for_signal)
    }
}

/// Floor/ceiling every [`RegulationParams`] value must stay within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub min_strategies: u32,
    pub max_strategies: u32,
}
