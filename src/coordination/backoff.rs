use std::time::Duration;

use crate::config::BackoffConfig;

/// Fixed escalating wait schedule used before each reconnect attempt.
///
/// Stateless: the caller owns the attempt index and resets it to 0 on any
/// success. Indices past the end of the schedule clamp to the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSequencer {
    schedule: Vec<Duration>,
}

impl Default for BackoffSequencer {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl BackoffSequencer {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            config
                .schedule_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
        )
    }

    /// Wait before attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.schedule.last() {
            Some(last) => self.schedule.get(attempt).copied().unwrap_or(*last),
            None => Duration::ZERO,
        }
    }

    pub fn max_delay(&self) -> Duration {
        self.schedule.last().copied().unwrap_or(Duration::ZERO)
    }
}
