//! Host-facing types shared by every platform source.
//!
//! A platform source answers one question per field. Each answer is a
//! `Result` so that a single unavailable field never takes the whole
//! snapshot down with it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a single field could not be read from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The host does not expose this information
    Unavailable(String),
    /// Reading the underlying source failed
    Io(String),
    /// The source was read but its contents made no sense
    Parse(String),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Unavailable(e) => write!(f, "unavailable: {e}"),
            FieldError::Io(e) => write!(f, "IO error: {e}"),
            FieldError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for FieldError {}

impl From<std::io::Error> for FieldError {
    fn from(e: std::io::Error) -> Self {
        FieldError::Io(e.to_string())
    }
}

/// Charging state of the primary battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    Unknown,
    Discharging,
    Charging,
    Full,
}

impl BatteryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryState::Unknown => "unknown",
            BatteryState::Discharging => "discharging",
            BatteryState::Charging => "charging",
            BatteryState::Full => "full",
        }
    }
}

/// Battery level (0.0 to 1.0) together with its charging state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerState {
    pub level: f64,
    pub state: BatteryState,
}

/// Size of the primary display in pixels plus its scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

/// Device orientation, encoded with the conventional mobile orientation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl Orientation {
    /// Numeric code sent on the wire.
    pub fn code(&self) -> i64 {
        match self {
            Orientation::Unknown => 0,
            Orientation::Portrait => 1,
            Orientation::PortraitUpsideDown => 2,
            Orientation::LandscapeLeft => 3,
            Orientation::LandscapeRight => 4,
            Orientation::FaceUp => 5,
            Orientation::FaceDown => 6,
        }
    }

    /// Fixed displays have no motion sensor, so orientation follows the aspect ratio.
    pub fn from_geometry(geometry: &DisplayGeometry) -> Self {
        if geometry.width <= 0.0 || geometry.height <= 0.0 {
            Orientation::Unknown
        } else if geometry.width >= geometry.height {
            Orientation::LandscapeLeft
        } else {
            Orientation::Portrait
        }
    }
}

/// Notification authorization as reported by the settings provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
    Ephemeral,
}

impl AuthorizationStatus {
    /// Only a full grant counts; provisional and ephemeral grants do not.
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }

    /// Parse a status name as written in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "not_determined" | "notdetermined" => Some(AuthorizationStatus::NotDetermined),
            "denied" => Some(AuthorizationStatus::Denied),
            "authorized" => Some(AuthorizationStatus::Authorized),
            "provisional" => Some(AuthorizationStatus::Provisional),
            "ephemeral" => Some(AuthorizationStatus::Ephemeral),
            _ => None,
        }
    }
}

/// Callback invoked exactly once with the resolved authorization status.
pub type AuthorizationCallback = Box<dyn FnOnce(AuthorizationStatus) + Send + 'static>;

/// Per-field sources of device state.
pub trait HostInfo: Send + Sync {
    /// Time since the host booted.
    fn uptime(&self) -> Result<Duration, FieldError>;

    fn power(&self) -> Result<PowerState, FieldError>;

    /// Hardware model name.
    fn model(&self) -> Result<String, FieldError>;

    /// Operating system name and version.
    fn system_version(&self) -> Result<String, FieldError>;

    /// User-visible device name.
    fn device_name(&self) -> Result<String, FieldError>;

    /// Locale identifier such as `en_US`.
    fn locale(&self) -> Result<String, FieldError>;

    /// Preferred language tag such as `en-US`.
    fn language(&self) -> Result<String, FieldError>;

    /// IANA time zone identifier.
    fn time_zone(&self) -> Result<String, FieldError>;

    fn display(&self) -> Result<DisplayGeometry, FieldError>;

    fn orientation(&self) -> Result<Orientation, FieldError> {
        self.display().map(|g| Orientation::from_geometry(&g))
    }
}

/// Asynchronous query for the notification authorization status.
///
/// Implementations must invoke the callback exactly once, from any thread.
pub trait SettingsProvider: Send + Sync {
    fn request_authorization_status(&self, callback: AuthorizationCallback);
}

/// Checks whether a URL scheme has a registered handler. Never launches it.
pub trait CapabilityProbe: Send + Sync {
    fn can_open(&self, scheme: &str) -> bool;
}

/// Version metadata declared by the package that hosts the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub version: Option<String>,
    pub build: Option<String>,
}

impl PackageMetadata {
    /// Metadata of this build: the crate version plus an optional build number
    /// set through `TELEMETRY_AGENT_BUILD` at compile time.
    pub fn current() -> Self {
        Self {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            build: option_env!("TELEMETRY_AGENT_BUILD").map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_codes() {
        assert_eq!(Orientation::Unknown.code(), 0);
        assert_eq!(Orientation::Portrait.code(), 1);
        assert_eq!(Orientation::LandscapeLeft.code(), 3);
        assert_eq!(Orientation::FaceDown.code(), 6);
    }

    #[test]
    fn test_orientation_from_geometry() {
        let wide = DisplayGeometry {
            width: 1920.0,
            height: 1080.0,
            scale: 1.0,
        };
        assert_eq!(Orientation::from_geometry(&wide), Orientation::LandscapeLeft);

        let tall = DisplayGeometry {
            width: 1080.0,
            height: 1920.0,
            scale: 2.0,
        };
        assert_eq!(Orientation::from_geometry(&tall), Orientation::Portrait);

        let empty = DisplayGeometry {
            width: 0.0,
            height: 0.0,
            scale: 1.0,
        };
        assert_eq!(Orientation::from_geometry(&empty), Orientation::Unknown);
    }

    #[test]
    fn test_only_full_grant_is_authorized() {
        assert!(AuthorizationStatus::Authorized.is_authorized());
        assert!(!AuthorizationStatus::Denied.is_authorized());
        assert!(!AuthorizationStatus::Provisional.is_authorized());
        assert!(!AuthorizationStatus::NotDetermined.is_authorized());
        assert!(!AuthorizationStatus::Ephemeral.is_authorized());
    }

    #[test]
    fn test_status_from_name() {
        assert_eq!(
            AuthorizationStatus::from_name("Authorized"),
            Some(AuthorizationStatus::Authorized)
        );
        assert_eq!(
            AuthorizationStatus::from_name("not-determined"),
            Some(AuthorizationStatus::NotDetermined)
        );
        assert_eq!(AuthorizationStatus::from_name("maybe"), None);
    }
}
