//! Trigger records and completion signals.
//!
//! Every pipeline run starts from one of three entry paths: the recurring
//! schedule, an inbound wake signal, or a manual user action. Each path gets
//! exactly one completion signal back once the run is over.

pub mod schedule;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use schedule::{ScheduleRegistry, DEFAULT_SCHEDULE_ID, DEFAULT_SCHEDULE_INTERVAL};

/// Which entry path fired.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Scheduled { schedule_id: String },
    Wake(WakeSignal),
    Manual,
}

impl Trigger {
    /// Short label used in logs and activity counters.
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Scheduled { .. } => TriggerKind::Scheduled,
            Trigger::Wake(_) => TriggerKind::Wake,
            Trigger::Manual => TriggerKind::Manual,
        }
    }

    /// Whether the run happens outside direct user interaction and needs an
    /// execution window.
    pub fn needs_window(&self) -> bool {
        !matches!(self, Trigger::Manual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Scheduled,
    Wake,
    Manual,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::Wake => write!(f, "wake"),
            TriggerKind::Manual => write!(f, "manual"),
        }
    }
}

/// An inbound wake signal and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeSignal {
    payload: Value,
}

impl WakeSignal {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// True when the payload carries a truthy background-fetch marker.
    ///
    /// The marker is looked up under `aps.content-available` first, then at
    /// the top level as `content-available` or `content_available`.
    pub fn content_available(&self) -> bool {
        let marker = self
            .payload
            .get("aps")
            .and_then(|aps| aps.get("content-available"))
            .or_else(|| self.payload.get("content-available"))
            .or_else(|| self.payload.get("content_available"));

        marker.map(is_truthy).unwrap_or(false)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "true"),
        _ => false,
    }
}

/// Completion signal returned to whoever fired the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchResult {
    /// A snapshot reached the collector
    NewData,
    /// Nothing to do for this trigger
    NoData,
    /// The run ended without delivering a snapshot
    Failed,
}

impl std::fmt::Display for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchResult::NewData => write!(f, "newData"),
            FetchResult::NoData => write!(f, "noData"),
            FetchResult::Failed => write!(f, "failed"),
        }
    }
}
