//! Host environment module for the device telemetry agent.
//!
//! This module provides the per-field sources a snapshot is built from:
//! platform readers for device state, the notification settings query and
//! the URL scheme capability probe.

pub mod env;
pub mod identity;
pub mod settings;
pub mod types;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
pub mod generic;

// Re-export commonly used types
pub use identity::InstallationIdentity;
pub use settings::{FixedSettings, SystemSettingsProvider};
pub use types::{
    AuthorizationCallback, AuthorizationStatus, BatteryState, CapabilityProbe, DisplayGeometry,
    FieldError, HostInfo, Orientation, PackageMetadata, PowerState, SettingsProvider,
};

#[cfg(target_os = "linux")]
pub use linux::{LinuxHost, SchemeHandlerProbe};

/// Platform-agnostic host type alias
#[cfg(target_os = "linux")]
pub type SystemHost = LinuxHost;

#[cfg(not(target_os = "linux"))]
pub use generic::{GenericHost, SchemeHandlerProbe};

/// Platform-agnostic host type alias
#[cfg(not(target_os = "linux"))]
pub type SystemHost = GenericHost;
