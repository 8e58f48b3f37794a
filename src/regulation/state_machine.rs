//! Regulation State Machine
//!
//! Transition table (initial level: Normal):
//!
//! | From      | Trigger                                   | To        |
//! |-----------|-------------------------------------------|-----------|
//! | Normal    | consecutive losses >= `loss_trigger`      | Cautious  |
//! | Cautious  | consecutive losses >= `emergency_threshold` | Emergency |
//! | Emergency | consecutive wins >= `recovery_wins_needed`  | Normal    |
//!
//! Each outcome updates exactly one streak counter, resets the other, and
//! evaluates the row for the current level only. Cautious has no self-loop:
//! further losses below the emergency threshold leave parameters alone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::snapshot::{ConfigSnapshot, SnapshotStore, StreakId};
use crate::config::RegulationConfig;
use crate::domain::{ParamBounds, RegulationParams, RiskLevel};

/// A level change produced by one outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    EnteredCautious {
        previous: RegulationParams,
        params: RegulationParams,
        consecutive_losses: u32,
    },
    EnteredEmergency {
        params: RegulationParams,
        consecutive_losses: u32,
        /// Whether a rollback snapshot for this degradation already existed
        snapshot_reused: bool,
    },
    Recovered {
        params: RegulationParams,
        /// False when no snapshot matched and defaults were applied
        from_snapshot: bool,
        consecutive_wins: u32,
    },
}

impl Transition {
    pub fn to_level(&self) -> RiskLevel {
        match self {
            Transition::EnteredCautious { .. } => RiskLevel::Cautious,
            Transition::EnteredEmergency { .. } => RiskLevel::Emergency,
            Transition::Recovered { .. } => RiskLevel::Normal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegulationStateMachine {
    config: RegulationConfig,
    bounds: ParamBounds,
    level: RiskLevel,
    params: RegulationParams,
    consecutive_losses: u32,
    consecutive_wins: u32,
    adjustments_made: u32,
    /// Loss streak currently running (or the last one)
    streak_id: StreakId,
    next_streak_id: StreakId,
    /// Streak that took the machine out of Normal
    degradation_streak: Option<StreakId>,
    snapshots: SnapshotStore,
}

impl RegulationStateMachine {
    pub fn new(config: RegulationConfig) -> Self {
        let bounds = config.bounds();
        let params = config.default_params().clamped(&bounds);
        let snapshots = SnapshotStore::new(config.snapshot_history);
        Self {
            config,
            bounds,
            level: RiskLevel::Normal,
            params,
            consecutive_losses: 0,
            consecutive_wins: 0,
            adjustments_made: 0,
            streak_id: 0,
            next_streak_id: 1,
            degradation_streak: None,
            snapshots,
        }
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn params(&self) -> RegulationParams {
        self.params
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn consecutive_wins(&self) -> u32 {
        self.consecutive_wins
    }

    pub fn adjustments_made(&self) -> u32 {
        self.adjustments_made
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn config(&self) -> &RegulationConfig {
        &self.config
    }

    /// Start in Emergency with parameters recovered from durable storage.
    /// No snapshot exists for the streak that caused it, so recovery will
    /// fall back to the process defaults.
    pub fn resume_emergency(&mut self, params: RegulationParams) {
        self.level = RiskLevel::Emergency;
        self.params = params.clamped(&self.bounds);
        self.degradation_streak = None;
        warn!(
            "Regulation resumed in EMERGENCY (confidence={:.2}, strategies={})",
            self.params.min_confidence_threshold, self.params.min_strategies_for_signal
        );
    }

    pub fn record(&mut self, won: bool) -> Option<Transition> {
        self.record_at(won, Utc::now())
    }

    /// Apply one trade result and evaluate the transition for the current level
    pub fn record_at(&mut self, won: bool, now: DateTime<Utc>) -> Option<Transition> {
        if won {
            self.consecutive_wins += 1;
            self.consecutive_losses = 0;
        } else {
            if self.consecutive_losses == 0 {
                self.streak_id = self.next_streak_id;
                self.next_streak_id += 1;
            }
            self.consecutive_losses += 1;
            self.consecutive_wins = 0;
        }

        match self.level {
            RiskLevel::Normal if self.consecutive_losses >= self.config.loss_trigger => {
                Some(self.enter_cautious(now))
            }
            RiskLevel::Cautious if self.consecutive_losses >= self.config.emergency_threshold => {
                Some(self.enter_emergency())
            }
            RiskLevel::Emergency if self.consecutive_wins >= self.config.recovery_wins_needed => {
                Some(self.recover())
            }
            _ => None,
        }
    }

    fn enter_cautious(&mut self, now: DateTime<Utc>) -> Transition {
        let previous = self.params;
        self.snapshots.push(ConfigSnapshot {
            params: previous,
            risk_level_before: RiskLevel::Normal,
            streak_id: self.streak_id,
            consecutive_losses_at_capture: self.consecutive_losses,
            captured_at: now,
        });
        self.degradation_streak = Some(self.streak_id);

        self.params = RegulationParams::new(
            previous.min_confidence_threshold + self.config.adjustment_step,
            previous.min_strategies_for_signal + 1,
        )
        .clamped(&self.bounds);
        self.level = RiskLevel::Cautious;
        self.adjustments_made += 1;

        warn!(
            "ADJUSTMENT #{}: consecutive_losses={} | confidence {:.2}->{:.2} | strategies {}->{}",
            self.adjustments_made,
            self.consecutive_losses,
            previous.min_confidence_threshold,
            self.params.min_confidence_threshold,
            previous.min_strategies_for_signal,
            self.params.min_strategies_for_signal
        );

        Transition::EnteredCautious {
            previous,
            params: self.params,
            consecutive_losses: self.consecutive_losses,
        }
    }

    fn enter_emergency(&mut self) -> Transition {
        let snapshot_reused = self
            .degradation_streak
            .is_some_and(|id| self.snapshots.contains_streak(id));
        if snapshot_reused {
            debug!(
                "Reusing rollback snapshot of streak {:?} for emergency entry",
                self.degradation_streak
            );
        }

        self.params = self.config.emergency_params().clamped(&self.bounds);
        self.level = RiskLevel::Emergency;

        error!(
            "EMERGENCY MODE: consecutive_losses={} | confidence->{:.2} strategies->{}",
            self.consecutive_losses,
            self.params.min_confidence_threshold,
            self.params.min_strategies_for_signal
        );

        Transition::EnteredEmergency {
            params: self.params,
            consecutive_losses: self.consecutive_losses,
            snapshot_reused,
        }
    }

    fn recover(&mut self) -> Transition {
        let restored = self
            .degradation_streak
            .and_then(|id| self.snapshots.find(id, RiskLevel::Normal))
            .map(|s| s.params);
        let from_snapshot = restored.is_some();

        self.params = match restored {
            Some(params) => params,
            None => {
                warn!("No rollback snapshot matches the degradation; applying defaults");
                self.config.default_params().clamped(&self.bounds)
            }
        };
        self.level = RiskLevel::Normal;
        self.degradation_streak = None;

        info!(
            "EMERGENCY CLEARED after {} consecutive wins | confidence={:.2} strategies={} (snapshot: {})",
            self.consecutive_wins,
            self.params.min_confidence_threshold,
            self.params.min_strategies_for_signal,
            if from_snapshot { "yes" } else { "no" }
        );

        Transition::Recovered {
            params: self.params,
            from_snapshot,
            consecutive_wins: self.consecutive_wins,
        }
    }
}
