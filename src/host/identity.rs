//! Stable installation identifier.
//!
//! A random UUID is generated the first time the agent runs and kept in the
//! data directory, so every snapshot from this installation carries the same
//! identifier.

use crate::host::types::FieldError;
use std::path::PathBuf;
use uuid::Uuid;

/// File name of the persisted identifier inside the data directory.
pub const IDENTITY_FILE: &str = "installation_id";

#[derive(Debug, Clone)]
pub struct InstallationIdentity {
    path: PathBuf,
}

impl InstallationIdentity {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            path: data_path.into().join(IDENTITY_FILE),
        }
    }

    /// Return the stored identifier, creating and persisting one if needed.
    pub fn load_or_create(&self) -> Result<String, FieldError> {
        if self.path.exists() {
            let stored = std::fs::read_to_string(&self.path)?;
            let id = Uuid::parse_str(stored.trim())
                .map_err(|e| FieldError::Parse(format!("installation id: {e}")))?;
            return Ok(id.to_string());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let id = Uuid::new_v4().to_string();
        std::fs::write(&self.path, &id)?;
        tracing::info!(path = ?self.path, "created installation identifier");
        Ok(id)
    }
}
