pub mod outcome;
pub mod risk;

pub use outcome::TradeOutcome;
pub use risk::{ParamBounds, RegulationParams, RiskLevel};
