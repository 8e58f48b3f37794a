use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed trade as reported by the engine.
///
/// Created once per closed trade and consumed once by the regulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub asset: String,
    pub won: bool,
    /// Signal confidence at entry, in [0, 1]
    pub confidence_used: f64,
    /// Number of strategies that agreed on the entry
    pub strategies_agreed: u32,
    /// Realised P&L in account currency
    #[serde(default)]
    pub profit: Decimal,
    /// Local hour of day the trade closed, 0-23
    pub timestamp_hour: u8,
}

impl TradeOutcome {
    pub fn new(
        asset: impl Into<String>,
        won: bool,
        confidence_used: f64,
        strategies_agreed: u32,
        profit: Decimal,
        timestamp_hour: u8,
    ) -> Self {
        Self {
            asset: asset.into(),
            won,
            confidence_used: confidence_used.clamp(0.0, 1.0),
            strategies_agreed,
            profit,
            timestamp_hour: timestamp_hour % 24,
        }
    }

    /// Hour bucket index, always in 0..24
    pub fn hour_index(&self) -> usize {
        usize::from(self.timestamp_hour) % 24
    }
}
