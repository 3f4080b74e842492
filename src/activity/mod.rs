//! Activity module for the device telemetry agent.
//!
//! Tracks how often each trigger fired and how the runs ended, so an
//! operator can see what the agent has been doing without reading logs.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
