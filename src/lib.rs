pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod regulation;
pub mod supervisor;

pub use adapters::{LogTransport, NotificationTransport, TelegramNotifier};
pub use config::AppConfig;
pub use coordination::{
    BackoffSequencer, CircuitBreaker, CircuitState, ReconnectOutcome, ReconnectSupervisor,
    VenueConnector,
};
pub use domain::{ParamBounds, RegulationParams, RiskLevel, TradeOutcome};
pub use engine::ResilienceCore;
pub use error::{BulwarkError, Result};
pub use persistence::{EmergencyRecord, EmergencyStore, FileEmergencyStore, MemoryEmergencyStore};
pub use regulation::{
    PerformanceLearner, PerformanceReport, Recommendation, RegulationStateMachine, Regulator,
    Transition,
};
pub use supervisor::{
    BotEvent, DispatcherStats, EnqueueOutcome, NotificationDispatcher, NotificationKind,
    NotificationLevel, NotificationMessage,
};
