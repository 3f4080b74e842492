//! Pipeline activity counters.
//!
//! Counts are kept per trigger kind and per completion signal. Nothing about
//! the snapshots themselves is recorded here.

use crate::trigger::{FetchResult, TriggerKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity counters for the running agent.
#[derive(Debug)]
pub struct ActivityLog {
    /// Runs started by the recurring schedule
    scheduled_runs: AtomicU64,
    /// Runs started by inbound wake signals
    wake_runs: AtomicU64,
    /// Runs started by the user
    manual_runs: AtomicU64,
    /// Runs that delivered a snapshot
    new_data: AtomicU64,
    /// Triggers acknowledged without running
    no_data: AtomicU64,
    /// Runs that ended without delivering
    failed: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            scheduled_runs: AtomicU64::new(0),
            wake_runs: AtomicU64::new(0),
            manual_runs: AtomicU64::new(0),
            new_data: AtomicU64::new(0),
            no_data: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an activity log that continues from the stats stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous activity stats");
        }

        log
    }

    /// Record that a trigger fired.
    pub fn record_trigger(&self, kind: TriggerKind) {
        let counter = match kind {
            TriggerKind::Scheduled => &self.scheduled_runs,
            TriggerKind::Wake => &self.wake_runs,
            TriggerKind::Manual => &self.manual_runs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the completion signal of a run.
    pub fn record_result(&self, result: FetchResult) {
        let counter = match result {
            FetchResult::NewData => &self.new_data,
            FetchResult::NoData => &self.no_data,
            FetchResult::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            scheduled_runs: self.scheduled_runs.load(Ordering::Relaxed),
            wake_runs: self.wake_runs.load(Ordering::Relaxed),
            manual_runs: self.manual_runs.load(Ordering::Relaxed),
            new_data: self.new_data.load(Ordering::Relaxed),
            no_data: self.no_data.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Activity:\n\
             - Scheduled triggers: {}\n\
             - Wake triggers: {}\n\
             - Manual triggers: {}\n\
             - Snapshots delivered: {}\n\
             - Acknowledged without data: {}\n\
             - Failed runs: {}\n\
             - Session duration: {} seconds",
            stats.scheduled_runs,
            stats.wake_runs,
            stats.manual_runs,
            stats.new_data,
            stats.no_data,
            stats.failed,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                scheduled_runs: stats.scheduled_runs,
                wake_runs: stats.wake_runs,
                manual_runs: stats.manual_runs,
                new_data: stats.new_data,
                no_data: stats.no_data,
                failed: stats.failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            // Readers only ever see a complete file, even with concurrent saves
            let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
            std::fs::write(&tmp, json)?;
            if let Err(e) = std::fs::rename(&tmp, path) {
                let _ = std::fs::remove_file(&tmp);
                return Err(e);
            }
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.scheduled_runs
                    .store(persisted.scheduled_runs, Ordering::Relaxed);
                self.wake_runs.store(persisted.wake_runs, Ordering::Relaxed);
                self.manual_runs
                    .store(persisted.manual_runs, Ordering::Relaxed);
                self.new_data.store(persisted.new_data, Ordering::Relaxed);
                self.no_data.store(persisted.no_data, Ordering::Relaxed);
                self.failed.store(persisted.failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.scheduled_runs,
            &self.wake_runs,
            &self.manual_runs,
            &self.new_data,
            &self.no_data,
            &self.failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the activity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub scheduled_runs: u64,
    pub wake_runs: u64,
    pub manual_runs: u64,
    pub new_data: u64,
    pub no_data: u64,
    pub failed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    scheduled_runs: u64,
    wake_runs: u64,
    manual_runs: u64,
    new_data: u64,
    no_data: u64,
    failed: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}
