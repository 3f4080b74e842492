//! Portable fallback for targets without a dedicated host module.
//!
//! This exists so the crate (and binary) can build everywhere. Only the
//! portable sources are answered; hardware fields report `Unavailable` and
//! the snapshot builder substitutes their sentinels.

use crate::host::env;
use crate::host::types::{CapabilityProbe, DisplayGeometry, FieldError, HostInfo, PowerState};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct GenericHost;

impl GenericHost {
    pub fn new() -> Self {
        Self
    }
}

fn unsupported(field: &str) -> FieldError {
    FieldError::Unavailable(format!(
        "{field} is not supported on {}",
        std::env::consts::OS
    ))
}

impl HostInfo for GenericHost {
    fn uptime(&self) -> Result<Duration, FieldError> {
        Err(unsupported("uptime"))
    }

    fn power(&self) -> Result<PowerState, FieldError> {
        Err(unsupported("power state"))
    }

    fn model(&self) -> Result<String, FieldError> {
        Err(unsupported("device model"))
    }

    fn system_version(&self) -> Result<String, FieldError> {
        Ok(std::env::consts::OS.to_string())
    }

    fn device_name(&self) -> Result<String, FieldError> {
        env::device_name()
    }

    fn locale(&self) -> Result<String, FieldError> {
        env::locale_from_env()
    }

    fn language(&self) -> Result<String, FieldError> {
        env::language_from_env()
    }

    fn time_zone(&self) -> Result<String, FieldError> {
        env::time_zone_from_env()
    }

    fn display(&self) -> Result<DisplayGeometry, FieldError> {
        Err(unsupported("display geometry"))
    }
}

/// Probe that never finds a handler.
#[derive(Debug, Clone, Default)]
pub struct SchemeHandlerProbe;

impl SchemeHandlerProbe {
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProbe for SchemeHandlerProbe {
    fn can_open(&self, _scheme: &str) -> bool {
        false
    }
}
