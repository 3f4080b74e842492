//! Snapshot module for the device telemetry agent.
//!
//! This module contains:
//! - The snapshot record and its wire field names
//! - The builder that collects fields from the host

pub mod builder;
pub mod types;

// Re-export commonly used types
pub use builder::{SnapshotBuilder, DEFAULT_PROBE_SCHEME, DEFAULT_SETTINGS_TIMEOUT};
pub use types::{keys, FieldValue, Snapshot, SnapshotDraft, OPTIONAL_KEYS, REQUIRED_KEYS, UNKNOWN};
