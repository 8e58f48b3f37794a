//! Performance Learner
//!
//! Rolling outcome statistics per hour of day and per asset. Answers
//! "what settings worked here" queries; never changes live parameters.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{RegulationParams, TradeOutcome};

/// Trades a bucket needs before it yields a recommendation
pub const MIN_SAMPLE_TRADES: u32 = 5;

/// Outcome counters for one hour or one asset. Counts only grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceBucket {
    pub trades: u32,
    pub wins: u32,
    pub cumulative_confidence: f64,
    /// Sum of confidence over winning trades only
    pub winning_confidence: f64,
    /// Strategies agreed on the most recent win
    pub last_win_strategies: Option<u32>,
}

impl PerformanceBucket {
    fn record(&mut self, outcome: &TradeOutcome) {
        self.trades += 1;
        self.cumulative_confidence += outcome.confidence_used;
        if outcome.won {
            self.wins += 1;
            self.winning_confidence += outcome.confidence_used;
            self.last_win_strategies = Some(outcome.strategies_agreed);
        }
    }

    pub fn losses(&self) -> u32 {
        self.trades - self.wins
    }

    /// Wins over trades as a fraction, 0 when empty
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.trades)
        }
    }

    fn best_confidence(&self, fallback: f64) -> f64 {
        if self.wins > 0 {
            self.winning_confidence / f64::from(self.wins)
        } else if self.trades > 0 {
            self.cumulative_confidence / f64::from(self.trades)
        } else {
            fallback
        }
    }

    fn best_strategies(&self, fallback: u32) -> u32 {
        self.last_win_strategies.unwrap_or(fallback)
    }
}

/// Advisory settings for one hour or asset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    Ready {
        confidence: f64,
        strategies: u32,
        /// wins / trades, as a fraction
        win_rate: f64,
        total_trades: u32,
    },
    /// Too few samples; carries the process defaults as a fallback suggestion
    InsufficientData {
        confidence: f64,
        strategies: u32,
        total_trades: u32,
    },
}

impl Recommendation {
    pub fn is_ready(&self) -> bool {
        matches!(self, Recommendation::Ready { .. })
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Recommendation::Ready { confidence, .. }
            | Recommendation::InsufficientData { confidence, .. } => *confidence,
        }
    }

    pub fn strategies(&self) -> u32 {
        match self {
            Recommendation::Ready { strategies, .. }
            | Recommendation::InsufficientData { strategies, .. } => *strategies,
        }
    }
}

/// Per-bucket line of the hour/asset breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary<K> {
    pub key: K,
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percent, two decimals
    pub win_rate: f64,
    pub best_confidence: f64,
    pub best_strategies: u32,
}

#[derive(Debug, Clone)]
pub struct PerformanceLearner {
    by_hour: [PerformanceBucket; 24],
    by_asset: HashMap<String, PerformanceBucket>,
    defaults: RegulationParams,
    min_samples: u32,
}

impl PerformanceLearner {
    pub fn new(defaults: RegulationParams) -> Self {
        Self {
            by_hour: Default::default(),
            by_asset: HashMap::new(),
            defaults,
            min_samples: MIN_SAMPLE_TRADES,
        }
    }

    pub fn record(&mut self, outcome: &TradeOutcome) {
        self.by_hour[outcome.hour_index()].record(outcome);
        self.by_asset
            .entry(outcome.asset.clone())
            .or_default()
            .record(outcome);
    }

    pub fn hour_bucket(&self, hour: u8) -> &PerformanceBucket {
        &self.by_hour[usize::from(hour) % 24]
    }

    pub fn asset_bucket(&self, asset: &str) -> Option<&PerformanceBucket> {
        self.by_asset.get(asset)
    }

    pub fn optimal_for_hour(&self, hour: u8) -> Recommendation {
        self.recommend(Some(self.hour_bucket(hour)))
    }

    pub fn optimal_for_asset(&self, asset: &str) -> Recommendation {
        self.recommend(self.asset_bucket(asset))
    }

    fn recommend(&self, bucket: Option<&PerformanceBucket>) -> Recommendation {
        let trades = bucket.map_or(0, |b| b.trades);
        match bucket {
            Some(b) if b.trades >= self.min_samples => Recommendation::Ready {
                confidence: b.best_confidence(self.defaults.min_confidence_threshold),
                strategies: b.best_strategies(self.defaults.min_strategies_for_signal),
                win_rate: b.win_rate(),
                total_trades: b.trades,
            },
            _ => Recommendation::InsufficientData {
                confidence: self.defaults.min_confidence_threshold,
                strategies: self.defaults.min_strategies_for_signal,
                total_trades: trades,
            },
        }
    }

    /// Every hour with at least one trade, in hour order
    pub fn by_hour(&self) -> Vec<BucketSummary<u8>> {
        (0u8..24)
            .zip(self.by_hour.iter())
            .filter(|(_, b)| b.trades > 0)
            .map(|(hour, b)| self.summarize(hour, b))
            .collect()
    }

    /// Every asset with at least one trade, sorted by name
    pub fn by_asset(&self) -> Vec<BucketSummary<String>> {
        let mut rows: Vec<_> = self
            .by_asset
            .iter()
            .filter(|(_, b)| b.trades > 0)
            .map(|(asset, b)| self.summarize(asset.clone(), b))
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    fn summarize<K>(&self, key: K, bucket: &PerformanceBucket) -> BucketSummary<K> {
        BucketSummary {
            key,
            total: bucket.trades,
            wins: bucket.wins,
            losses: bucket.losses(),
            win_rate: round2(bucket.win_rate() * 100.0),
            best_confidence: bucket.best_confidence(self.defaults.min_confidence_threshold),
            best_strategies: bucket.best_strategies(self.defaults.min_strategies_for_signal),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn trade(asset: &str, won: bool, confidence: f64, strategies: u32, hour: u8) -> TradeOutcome {
        TradeOutcome::new(asset, won, confidence, strategies, Decimal::ZERO, hour)
    }

    fn learner() -> PerformanceLearner {
        PerformanceLearner::new(RegulationParams::new(0.55, 2))
    }

    #[test]
    fn test_insufficient_until_fifth_trade() {
        let mut learner = learner();
        for i in 0..4 {
            learner.record(&trade("EURUSD", i % 2 == 0, 0.6, 2, 10));
        }
        assert_eq!(
            learner.optimal_for_hour(10),
            Recommendation::InsufficientData {
                confidence: 0.55,
                strategies: 2,
                total_trades: 4
            }
        );

        learner.record(&trade("EURUSD", true, 0.6, 2, 10));
        match learner.optimal_for_hour(10) {
            Recommendation::Ready {
                win_rate,
                total_trades,
                ..
            } => {
                assert_eq!(total_trades, 5);
                assert!((win_rate - 0.6).abs() < 1e-9);
            }
            other => panic!("expected recommendation, got {other:?}"),
        }
    }

    #[test]
    fn test_confidence_from_winning_trades() {
        let mut learner = learner();
        learner.record(&trade("GBPUSD", true, 0.60, 2, 3));
        learner.record(&trade("GBPUSD", false, 0.90, 1, 3));
        learner.record(&trade("GBPUSD", true, 0.70, 3, 3));
        learner.record(&trade("GBPUSD", false, 0.90, 1, 3));
        learner.record(&trade("GBPUSD", false, 0.90, 1, 3));

        let rec = learner.optimal_for_asset("GBPUSD");
        assert!((rec.confidence() - 0.65).abs() < 1e-9);
        assert_eq!(rec.strategies(), 3);
    }

    #[test]
    fn test_all_losses_falls_back_to_mean_confidence() {
        let mut learner = learner();
        for confidence in [0.5, 0.6, 0.7, 0.6, 0.6] {
            learner.record(&trade("USDJPY", false, confidence, 2, 8));
        }
        let rec = learner.optimal_for_asset("USDJPY");
        assert!(rec.is_ready());
        assert!((rec.confidence() - 0.6).abs() < 1e-9);
        assert_eq!(rec.strategies(), 2);
    }

    #[test]
    fn test_unknown_asset_is_insufficient() {
        let learner = learner();
        assert!(!learner.optimal_for_asset("XAUUSD").is_ready());
    }

    #[test]
    fn test_breakdowns_skip_empty_buckets() {
        let mut learner = learner();
        learner.record(&trade("EURUSD", true, 0.6, 2, 9));
        learner.record(&trade("EURUSD", false, 0.6, 2, 9));
        learner.record(&trade("AUDUSD", true, 0.6, 2, 22));

        let hours = learner.by_hour();
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].key, 9);
        assert_eq!(hours[0].win_rate, 50.0);
        assert_eq!(hours[1].key, 22);

        let assets = learner.by_asset();
        assert_eq!(assets[0].key, "AUDUSD");
        assert_eq!(assets[1].key, "EURUSD");
        assert_eq!(assets[1].losses, 1);
    }
}
