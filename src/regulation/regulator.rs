//! Regulator
//!
//! Async owner of the regulation state. One trade outcome is applied under
//! a single lock: streak update, transition, notification enqueue and
//! persistence hand-off all complete before the next outcome is seen.
//! Neither notification delivery nor disk writes run on the caller's path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::learner::{round2, BucketSummary, PerformanceLearner, Recommendation};
use super::state_machine::{RegulationStateMachine, Transition};
use crate::config::RegulationConfig;
use crate::domain::{RegulationParams, RiskLevel, TradeOutcome};
use crate::persistence::{EmergencyRecord, EmergencyStore, EmergencyWriter};
use crate::supervisor::{BotEvent, NotificationDispatcher, NotificationMessage};

/// Mode label used in emergency notifications
const EMERGENCY_MODE_LABEL: &str = "CONSERVATIVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    NoData,
    Normal,
    Cautious,
    Emergency,
}

impl From<RiskLevel> for ReportStatus {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Normal => ReportStatus::Normal,
            RiskLevel::Cautious => ReportStatus::Cautious,
            RiskLevel::Emergency => ReportStatus::Emergency,
        }
    }
}

/// Summary over the retained trade history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub status: ReportStatus,
    pub risk_level: RiskLevel,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent, two decimals
    pub win_rate: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub adjustments_made: u32,
    pub total_profit: Decimal,
    pub current_params: RegulationParams,
}

struct RegulatorState {
    machine: RegulationStateMachine,
    learner: PerformanceLearner,
    history: VecDeque<TradeOutcome>,
    /// Time of the Emergency entry currently in force
    emergency_at: Option<DateTime<Utc>>,
}

pub struct Regulator {
    state: Mutex<RegulatorState>,
    enabled: bool,
    history_limit: usize,
    dispatcher: Arc<NotificationDispatcher>,
    writer: EmergencyWriter,
}

impl Regulator {
    /// Build the regulator, resuming Emergency if the store says a previous
    /// run was in it. A load failure is logged and the regulator starts Normal.
    pub async fn start(
        config: RegulationConfig,
        dispatcher: Arc<NotificationDispatcher>,
        store: Arc<dyn EmergencyStore>,
    ) -> Self {
        let mut machine = RegulationStateMachine::new(config.clone());
        let learner = PerformanceLearner::new(config.default_params());
        let mut emergency_at = None;

        match store.load().await {
            Ok(Some(record)) if record.is_emergency() => {
                machine.resume_emergency(record.params);
                emergency_at = Some(record.emergency_at);
                dispatcher.enqueue(NotificationMessage::bot_event(
                    BotEvent::Started,
                    &format!("resumed in EMERGENCY (entered {})", record.emergency_at.format("%Y-%m-%d %H:%M UTC")),
                    Decimal::ZERO,
                ));
            }
            Ok(_) => debug!("No active emergency on record; starting Normal"),
            Err(e) => error!("Could not read emergency state, starting Normal: {}", e),
        }

        info!(
            "Regulator initialised (enabled={}, loss_trigger={}, emergency={}, level={})",
            config.enabled,
            config.loss_trigger,
            config.emergency_threshold,
            machine.level()
        );

        Self {
            enabled: config.enabled,
            history_limit: config.trade_history.max(1),
            state: Mutex::new(RegulatorState {
                machine,
                learner,
                history: VecDeque::new(),
                emergency_at,
            }),
            dispatcher,
            writer: EmergencyWriter::spawn(store),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Apply one closed trade. Returns the level change it caused, if any.
    pub async fn record_trade_outcome(&self, outcome: TradeOutcome) -> Option<Transition> {
        if !self.enabled {
            debug!("Regulation disabled; ignoring outcome for {}", outcome.asset);
            return None;
        }

        let mut state = self.state.lock().await;

        state.learner.record(&outcome);
        let transition = state.machine.record(outcome.won);

        info!(
            "Trade recorded: {} | {} | streak: {}W/{}L | level={}",
            outcome.asset,
            if outcome.won { "WIN" } else { "LOSS" },
            state.machine.consecutive_wins(),
            state.machine.consecutive_losses(),
            state.machine.level()
        );

        if state.history.len() >= self.history_limit {
            state.history.pop_front();
        }
        state.history.push_back(outcome);

        if let Some(transition) = &transition {
            self.on_transition(&mut state, transition);
        }

        transition
    }

    fn on_transition(&self, state: &mut RegulatorState, transition: &Transition) {
        match transition {
            Transition::EnteredCautious {
                params,
                consecutive_losses,
                ..
            } => {
                if self.writer.retry_pending() {
                    debug!("Re-submitted unsaved emergency state on Cautious entry");
                }
                self.dispatcher.enqueue(NotificationMessage::adjustment(
                    &format!("{consecutive_losses} consecutive losses"),
                    params.min_confidence_threshold,
                    *consecutive_losses,
                ));
            }
            Transition::EnteredEmergency {
                params,
                consecutive_losses,
                ..
            } => {
                let now = Utc::now();
                state.emergency_at = Some(now);
                self.writer
                    .submit(EmergencyRecord::new(RiskLevel::Emergency, *params, now));
                self.dispatcher.enqueue(NotificationMessage::emergency(
                    &format!("{consecutive_losses} consecutive losses"),
                    *consecutive_losses,
                    EMERGENCY_MODE_LABEL,
                ));
            }
            Transition::Recovered {
                params,
                consecutive_wins,
                ..
            } => {
                // Overwrite the record so a restart does not resume a cleared emergency
                let emergency_at = state.emergency_at.take().unwrap_or_else(Utc::now);
                self.writer
                    .submit(EmergencyRecord::new(RiskLevel::Normal, *params, emergency_at));
                self.dispatcher
                    .enqueue(NotificationMessage::emergency_cleared(*consecutive_wins));
            }
        }
    }

    pub async fn current_params(&self) -> RegulationParams {
        self.state.lock().await.machine.params()
    }

    pub async fn risk_level(&self) -> RiskLevel {
        self.state.lock().await.machine.level()
    }

    /// Whether an emergency record is waiting for a successful write
    pub fn persistence_pending(&self) -> bool {
        self.writer.has_pending()
    }

    pub async fn performance_report(&self) -> PerformanceReport {
        let state = self.state.lock().await;
        let machine = &state.machine;

        let total = state.history.len();
        let wins = state.history.iter().filter(|t| t.won).count();
        let profit: Decimal = state.history.iter().map(|t| t.profit).sum();
        let win_rate = if total == 0 {
            0.0
        } else {
            round2(wins as f64 / total as f64 * 100.0)
        };

        PerformanceReport {
            status: if total == 0 {
                ReportStatus::NoData
            } else {
                machine.level().into()
            },
            risk_level: machine.level(),
            total_trades: total,
            wins,
            losses: total - wins,
            win_rate,
            consecutive_wins: machine.consecutive_wins(),
            consecutive_losses: machine.consecutive_losses(),
            adjustments_made: machine.adjustments_made(),
            total_profit: profit.round_dp(2),
            current_params: machine.params(),
        }
    }

    /// Advisory settings for an hour of day; never changes live parameters
    pub async fn optimal_config_for_hour(&self, hour: u8) -> Recommendation {
        self.state.lock().await.learner.optimal_for_hour(hour)
    }

    pub async fn optimal_config_for_asset(&self, asset: &str) -> Recommendation {
        self.state.lock().await.learner.optimal_for_asset(asset)
    }

    pub async fn performance_by_hour(&self) -> Vec<BucketSummary<u8>> {
        self.state.lock().await.learner.by_hour()
    }

    pub async fn performance_by_asset(&self) -> Vec<BucketSummary<String>> {
        self.state.lock().await.learner.by_asset()
    }
}

impl std::fmt::Debug for Regulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regulator")
            .field("enabled", &self.enabled)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}
