//! Device Telemetry Agent - background device state reporting.
//!
//! On a recurring schedule, an inbound wake signal, or a manual request, the
//! agent captures a snapshot of device state and posts it as JSON to a
//! collector endpoint, inside a bounded background execution window.
//!
//! # Guarantees
//!
//! - **Complete snapshots**: the notification settings query is resolved
//!   before a snapshot exists; a half-built snapshot is never submitted
//! - **Degraded, not failed**: a field the host cannot provide is replaced
//!   by a sentinel and logged
//! - **Bounded windows**: background windows are released exactly once,
//!   including when the host deadline passes mid-run
//! - **One shot**: failed submissions are logged, never retried or stored
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Device Telemetry Agent                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌─────────────┐        │
//! │  │   Trigger   │──▶│   Snapshot   │──▶│  Submitter  │──▶ HTTP│
//! │  │ sched/wake/ │   │   Builder    │   │ (POST JSON) │        │
//! │  │   manual    │   └──────────────┘   └─────────────┘        │
//! │  └─────────────┘          │                                  │
//! │         │                 ▼                                  │
//! │         ▼          ┌──────────────┐                          │
//! │  ┌─────────────┐   │ Host sources │                          │
//! │  │  Execution  │   │ + settings   │                          │
//! │  │   Window    │   └──────────────┘                          │
//! │  └─────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use device_telemetry_agent::{Config, TelemetryAgent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let agent = TelemetryAgent::from_config(&config)?;
//!
//! // Hand the manual trigger to the UI layer
//! let manual = agent.manual_trigger();
//! let result = manual.run().await;
//! println!("manual run: {result}");
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod agent;
pub mod config;
pub mod host;
pub mod snapshot;
pub mod submit;
pub mod trigger;
pub mod window;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use agent::{ManualTrigger, TelemetryAgent};
pub use config::{Config, ConfigError};
pub use snapshot::{FieldValue, Snapshot, SnapshotBuilder};
pub use submit::{CollectorEndpoint, SubmissionOutcome, SubmitError, Submitter};
pub use trigger::{FetchResult, ScheduleRegistry, Trigger, TriggerKind, WakeSignal};
pub use window::{ExecutionWindow, LocalWindowHost, WindowHandle, WindowHost, WindowState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Declaration of collected data that can be displayed to users.
pub const DATA_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║          DEVICE TELEMETRY AGENT - DATA DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Each report is a single snapshot of device state.               ║
║                                                                  ║
║  ✓ WHAT WE REPORT:                                               ║
║    • Boot time, battery level and charging state                 ║
║    • Device model, OS version, device name                       ║
║    • A random installation identifier                            ║
║    • Locale, language and time zone                              ║
║    • Screen size, scale and orientation                          ║
║    • Whether notifications are enabled                           ║
║    • Whether one specific app is installed                       ║
║    • Agent version                                               ║
║                                                                  ║
║  ✗ WHAT WE NEVER REPORT:                                         ║
║    • Files, messages or screen content                           ║
║    • Location                                                    ║
║    • Which other applications you use                            ║
║                                                                  ║
║  Reports that fail to send are dropped, never stored.            ║
║                                                                  ║
║  You can view agent activity anytime with:                       ║
║    telemetry-agent status                                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_declaration_contents() {
        assert!(DATA_DECLARATION.contains("DATA DECLARATION"));
        assert!(DATA_DECLARATION.contains("NEVER REPORT"));
        assert!(DATA_DECLARATION.contains("installation identifier"));
    }
}
