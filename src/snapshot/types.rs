//! Snapshot record types.
//!
//! A `Snapshot` can only be obtained by resolving a `SnapshotDraft` with the
//! notification authorization outcome, so a snapshot whose settings query is
//! still pending cannot exist, let alone be submitted.

use serde::Serialize;
use std::collections::BTreeMap;

/// Wire names of every snapshot field.
pub mod keys {
    pub const BOOT_TIME: &str = "bootTime";
    pub const BATTERY_LEVEL: &str = "batteryLevel";
    pub const BATTERY_STATE: &str = "batteryState";
    pub const DEVICE_MODEL: &str = "deviceModel";
    pub const SYSTEM_VERSION: &str = "systemVersion";
    pub const DEVICE_NAME: &str = "deviceName";
    pub const DEVICE_IDENTIFIER: &str = "deviceIdentifier";
    pub const LOCALE: &str = "locale";
    pub const LANGUAGE: &str = "language";
    pub const TIME_ZONE: &str = "timeZone";
    pub const SCREEN_WIDTH: &str = "screenWidth";
    pub const SCREEN_HEIGHT: &str = "screenHeight";
    pub const SCREEN_SCALE: &str = "screenScale";
    pub const ORIENTATION: &str = "orientation";
    pub const NOTIFICATIONS_ENABLED: &str = "notificationsEnabled";
    pub const APP_VERSION: &str = "appVersion";
    pub const APP_BUILD: &str = "appBuild";
    pub const HAS_DUOLINGO: &str = "hasDuolingo";
}

/// Fields present in every snapshot.
pub const REQUIRED_KEYS: [&str; 15] = [
    keys::BOOT_TIME,
    keys::BATTERY_LEVEL,
    keys::BATTERY_STATE,
    keys::DEVICE_MODEL,
    keys::SYSTEM_VERSION,
    keys::DEVICE_NAME,
    keys::DEVICE_IDENTIFIER,
    keys::LOCALE,
    keys::LANGUAGE,
    keys::TIME_ZONE,
    keys::SCREEN_WIDTH,
    keys::SCREEN_HEIGHT,
    keys::SCREEN_SCALE,
    keys::ORIENTATION,
    keys::NOTIFICATIONS_ENABLED,
];

/// Fields a collector must tolerate being absent.
pub const OPTIONAL_KEYS: [&str; 3] = [keys::APP_VERSION, keys::APP_BUILD, keys::HAS_DUOLINGO];

/// Sentinel for identity strings the host could not provide.
pub const UNKNOWN: &str = "Unknown";

/// A single snapshot value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Snapshot under construction: every field except notification authorization.
#[derive(Debug, Default)]
pub struct SnapshotDraft {
    fields: BTreeMap<String, FieldValue>,
}

impl SnapshotDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Complete the draft with the resolved authorization outcome.
    pub fn resolve(mut self, notifications_enabled: bool) -> Snapshot {
        self.fields.insert(
            keys::NOTIFICATIONS_ENABLED.to_string(),
            FieldValue::Bool(notifications_enabled),
        );
        Snapshot {
            fields: self.fields,
        }
    }
}

/// Immutable record of device state at one point in time.
///
/// Serializes as a flat JSON object with keys in sorted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.get(keys::NOTIFICATIONS_ENABLED)
            .and_then(FieldValue::as_bool)
            .unwrap_or(false)
    }

    /// Required fields missing from this snapshot.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !self.contains_key(key))
            .collect()
    }

    /// Canonical JSON body for submission.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
