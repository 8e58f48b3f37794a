use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::domain::{ParamBounds, RegulationParams};
use crate::error::{BulwarkError, Result};
use crate::supervisor::NotificationLevel;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub regulation: RegulationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegulationConfig {
    /// Master switch; when off, trade outcomes are ignored
    pub enabled: bool,
    /// Consecutive losses before entering Cautious
    pub loss_trigger: u32,
    /// Consecutive losses before entering Emergency
    pub emergency_threshold: u32,
    /// Consecutive wins needed to leave Emergency
    pub recovery_wins_needed: u32,
    /// Confidence raised on entering Cautious
    pub adjustment_step: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub min_strategies: u32,
    pub max_strategies: u32,
    /// Hard confidence floor forced during Emergency
    pub emergency_min_confidence: f64,
    /// Strategy consensus forced during Emergency
    pub emergency_min_strategies: u32,
    /// Snapshots retained for rollback (oldest dropped)
    pub snapshot_history: usize,
    /// Outcomes retained for the performance report
    pub trade_history: usize,
    /// Process-default confidence threshold
    pub default_confidence: f64,
    /// Process-default strategy consensus
    pub default_strategies: u32,
}

impl Default for RegulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            loss_trigger: 3,
            emergency_threshold: 5,
            recovery_wins_needed: 2,
            adjustment_step: 0.05,
            min_confidence: 0.40,
            max_confidence: 0.80,
            min_strategies: 1,
            max_strategies: 4,
            emergency_min_confidence: 0.70,
            emergency_min_strategies: 3,
            snapshot_history: 10,
            trade_history: 200,
            default_confidence: 0.55,
            default_strategies: 2,
        }
    }
}

impl RegulationConfig {
    pub fn bounds(&self) -> ParamBounds {
        ParamBounds {
            min_confidence: self.min_confidence,
            max_confidence: self.max_confidence,
            min_strategies: self.min_strategies,
            max_strategies: self.max_strategies,
        }
    }

    pub fn default_params(&self) -> RegulationParams {
        RegulationParams::new(self.default_confidence, self.default_strategies)
    }

    pub fn emergency_params(&self) -> RegulationParams {
        RegulationParams::new(self.emergency_min_confidence, self.emergency_min_strategies)
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if !(self.min_confidence > 0.0 && self.min_confidence <= self.max_confidence && self.max_confidence <= 1.0) {
            errors.push(format!(
                "regulation confidence bounds must satisfy 0 < min ({}) <= max ({}) <= 1",
                self.min_confidence, self.max_confidence
            ));
        }
        if self.min_strategies < 1 || self.min_strategies > self.max_strategies {
            errors.push(format!(
                "regulation strategy bounds must satisfy 1 <= min ({}) <= max ({})",
                self.min_strategies, self.max_strategies
            ));
        }
        let bounds = self.bounds();
        if !self.emergency_params().within(&bounds) {
            errors.push("emergency_min_confidence/emergency_min_strategies must lie within the regulation bounds".to_string());
        }
        if !self.default_params().within(&bounds) {
            errors.push("default_confidence/default_strategies must lie within the regulation bounds".to_string());
        }
        if self.loss_trigger < 1 {
            errors.push("loss_trigger must be >= 1".to_string());
        }
        if self.emergency_threshold <= self.loss_trigger {
            errors.push(format!(
                "emergency_threshold ({}) must be greater than loss_trigger ({})",
                self.emergency_threshold, self.loss_trigger
            ));
        }
        if self.recovery_wins_needed < 1 {
            errors.push("recovery_wins_needed must be >= 1".to_string());
        }
        if !(self.adjustment_step > 0.0) {
            errors.push("adjustment_step must be positive".to_string());
        }
        if self.snapshot_history < 1 {
            errors.push("snapshot_history must be >= 1".to_string());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Minimum level delivered (overridden by TELEGRAM_LEVEL)
    pub level: NotificationLevel,
    /// Bounded buffer size; oldest message evicted on overflow
    pub capacity: usize,
    /// Delivery attempts per message
    pub max_retries: u32,
    /// Fixed wait between delivery attempts
    pub retry_delay_ms: u64,
    /// Flush window granted to the worker on shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            level: NotificationLevel::Trades,
            capacity: 100,
            max_retries: 3,
            retry_delay_ms: 2000,
            shutdown_grace_ms: 5000,
        }
    }
}

impl NotificationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive connection failures that open the circuit
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a trial is allowed
    pub cooldown_secs: u64,
    /// Consecutive trial successes that close the circuit
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 120,
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Wait before each reconnect attempt, indexed by attempt number
    pub schedule_secs: Vec<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            schedule_secs: vec![5, 10, 30, 60, 120],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Durable record of the last Emergency entry
    pub emergency_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            emergency_file: PathBuf::from("data/emergency_state.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
    /// Directory for daily rolling log files
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

/// Telegram credentials, read from the environment only
#[derive(Clone, Default)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
    pub level: Option<NotificationLevel>,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.bot_token.is_empty() {
            String::new()
        } else {
            format!("{}***", self.bot_token.chars().take(8).collect::<String>())
        };
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &token)
            .field("chat_id", &self.chat_id)
            .field("level", &self.level)
            .finish()
    }
}

impl TelegramCredentials {
    pub fn from_env() -> Self {
        Self {
            bot_token: std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            chat_id: std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
            level: Self::level_override(std::env::var("TELEGRAM_LEVEL").ok()),
        }
    }

    /// Parse a TELEGRAM_LEVEL value; an unknown level is ignored with a warning
    fn level_override(raw: Option<String>) -> Option<NotificationLevel> {
        let raw = raw?;
        match raw.parse() {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("Ignoring TELEGRAM_LEVEL={:?}: {}", raw, e);
                None
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("BULWARK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (BULWARK_REGULATION__LOSS_TRIGGER, etc.)
            .add_source(
                Environment::with_prefix("BULWARK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("backoff.schedule_secs"),
            );

        builder.build()?.try_deserialize()
    }

    /// Load and validate; an invalid configuration is fatal
    pub fn load_validated<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config = Self::load_from(config_dir)?;
        config.validate().map_err(BulwarkError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        self.regulation.validate_into(&mut errors);

        if self.notifications.capacity < 1 {
            errors.push("notifications.capacity must be >= 1".to_string());
        }
        if self.notifications.max_retries < 1 {
            errors.push("notifications.max_retries must be >= 1".to_string());
        }

        if self.breaker.failure_threshold < 1 {
            errors.push("breaker.failure_threshold must be >= 1".to_string());
        }
        if self.breaker.success_threshold < 1 {
            errors.push("breaker.success_threshold must be >= 1".to_string());
        }

        let schedule = &self.backoff.schedule_secs;
        if schedule.is_empty() {
            errors.push("backoff.schedule_secs must not be empty".to_string());
        } else if schedule.windows(2).any(|w| w[1] < w[0]) {
            errors.push("backoff.schedule_secs must be non-decreasing".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// One-line summary with no secrets, for startup logs
    pub fn summary(&self) -> String {
        let r = &self.regulation;
        format!(
            "regulation(enabled={}, loss_trigger={}, emergency={}, recovery_wins={}, step={}, confidence=[{}, {}]) \
             notifications(level={}, capacity={}, retries={}x{}ms) \
             breaker(failures={}, cooldown={}s, successes={}) backoff={:?}s",
            r.enabled,
            r.loss_trigger,
            r.emergency_threshold,
            r.recovery_wins_needed,
            r.adjustment_step,
            r.min_confidence,
            r.max_confidence,
            self.notifications.level,
            self.notifications.capacity,
            self.notifications.max_retries,
            self.notifications.retry_delay_ms,
            self.breaker.failure_threshold,
            self.breaker.cooldown_secs,
            self.breaker.success_threshold,
            self.backoff.schedule_secs,
        )
    }
}
