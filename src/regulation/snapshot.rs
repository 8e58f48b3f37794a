//! Configuration snapshots used to roll back after a degraded streak.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

use crate::domain::{RegulationParams, RiskLevel};

/// Identifies one run of consecutive losses. A new id is issued on the
/// first loss after a win (or at start).
pub type StreakId = u64;

/// Parameters captured before a degrading transition, tagged with the
/// streak that caused it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    pub params: RegulationParams,
    pub risk_level_before: RiskLevel,
    pub streak_id: StreakId,
    pub consecutive_losses_at_capture: u32,
    pub captured_at: DateTime<Utc>,
}

/// Bounded snapshot history, oldest dropped first
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    snapshots: VecDeque<ConfigSnapshot>,
    retention: usize,
}

impl SnapshotStore {
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            snapshots: VecDeque::with_capacity(retention),
            retention,
        }
    }

    pub fn push(&mut self, snapshot: ConfigSnapshot) {
        if self.snapshots.len() >= self.retention {
            if let Some(dropped) = self.snapshots.pop_front() {
                debug!(
                    "Snapshot history full; dropped snapshot of streak {}",
                    dropped.streak_id
                );
            }
        }
        self.snapshots.push_back(snapshot);
    }

    /// Most recent snapshot captured for `streak_id` at level `before`
    pub fn find(&self, streak_id: StreakId, before: RiskLevel) -> Option<&ConfigSnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.streak_id == streak_id && s.risk_level_before == before)
    }

    pub fn contains_streak(&self, streak_id: StreakId) -> bool {
        self.snapshots.iter().any(|s| s.streak_id == streak_id)
    }

    pub fn latest(&self) -> Option<&ConfigSnapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigSnapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(streak_id: StreakId, confidence: f64, before: RiskLevel) -> ConfigSnapshot {
        ConfigSnapshot {
            params: RegulationParams::new(confidence, 2),
            risk_level_before: before,
            streak_id,
            consecutive_losses_at_capture: 3,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_retention_drops_oldest() {
        let mut store = SnapshotStore::new(10);
        for id in 0..12 {
            store.push(snapshot(id, 0.55, RiskLevel::Normal));
        }
        assert_eq!(store.len(), 10);
        assert!(!store.contains_streak(0));
        assert!(!store.contains_streak(1));
        assert_eq!(store.latest().map(|s| s.streak_id), Some(11));
    }

    #[test]
    fn test_find_prefers_most_recent_match() {
        let mut store = SnapshotStore::new(10);
        store.push(snapshot(4, 0.50, RiskLevel::Normal));
        store.push(snapshot(4, 0.60, RiskLevel::Normal));
        store.push(snapshot(5, 0.65, RiskLevel::Normal));

        let found = store.find(4, RiskLevel::Normal).unwrap();
        assert_eq!(found.params.min_confidence_threshold, 0.60);
        assert!(store.find(4, RiskLevel::Cautious).is_none());
        assert!(store.find(9, RiskLevel::Normal).is_none());
    }
}
