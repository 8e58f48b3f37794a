//! Persistence Layer for crash recovery
//!
//! Holds the durable record written on every Emergency entry and read once
//! at start so a crash mid-Emergency does not reset to permissive settings.

pub mod emergency_store;
pub mod writer;

pub use emergency_store::{EmergencyRecord, EmergencyStore, FileEmergencyStore, MemoryEmergencyStore};
pub use writer::EmergencyWriter;
