//! Supervisor Layer for outbound notifications
//!
//! - Typed notification messages with fixed per-kind templates
//! - Bounded, non-blocking dispatcher with a single delivery worker

pub mod dispatcher;
pub mod message;

pub use dispatcher::{DispatcherStats, EnqueueOutcome, NotificationDispatcher};
pub use message::{BotEvent, NotificationKind, NotificationLevel, NotificationMessage};
