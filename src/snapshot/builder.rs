//! Snapshot builder.
//!
//! Collects every field from the host sources and resolves the notification
//! authorization query before handing out a finished [`Snapshot`]. Field
//! failures degrade to sentinels; they never abort the snapshot.

use crate::host::{
    AuthorizationStatus, CapabilityProbe, FieldError, HostInfo, InstallationIdentity,
    Orientation, PackageMetadata, SettingsProvider,
};
use crate::snapshot::types::{keys, Snapshot, SnapshotDraft, UNKNOWN};
use chrono::{SecondsFormat, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

/// Default third-party URL scheme probed for `hasDuolingo`.
pub const DEFAULT_PROBE_SCHEME: &str = "duolingo";

/// Default bound on the notification settings wait.
pub const DEFAULT_SETTINGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds snapshots of the current device state.
///
/// `build` blocks its calling thread while the settings query resolves. Call
/// it from a thread that the settings provider does not need to answer on
/// (the agent uses a blocking worker for this).
pub struct SnapshotBuilder {
    host: Arc<dyn HostInfo>,
    settings: Arc<dyn SettingsProvider>,
    probe: Arc<dyn CapabilityProbe>,
    identity: InstallationIdentity,
    package: PackageMetadata,
    probe_scheme: String,
    settings_timeout: Option<Duration>,
}

impl SnapshotBuilder {
    pub fn new(
        host: Arc<dyn HostInfo>,
        settings: Arc<dyn SettingsProvider>,
        probe: Arc<dyn CapabilityProbe>,
        identity: InstallationIdentity,
    ) -> Self {
        Self {
            host,
            settings,
            probe,
            identity,
            package: PackageMetadata::default(),
            probe_scheme: DEFAULT_PROBE_SCHEME.to_string(),
            settings_timeout: Some(DEFAULT_SETTINGS_TIMEOUT),
        }
    }

    /// Report `appVersion`/`appBuild` from this metadata.
    pub fn with_package(mut self, package: PackageMetadata) -> Self {
        self.package = package;
        self
    }

    pub fn with_probe_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.probe_scheme = scheme.into();
        self
    }

    /// Bound the settings wait. `None` waits for the callback indefinitely.
    pub fn with_settings_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings_timeout = timeout;
        self
    }

    /// Build a fresh snapshot.
    pub fn build(&self) -> Snapshot {
        // Start the query first; it resolves while the other fields are read.
        let pending = self.request_authorization();

        let mut draft = SnapshotDraft::new();
        self.collect_fields(&mut draft);

        let enabled = self.await_authorization(pending);
        let snapshot = draft.resolve(enabled);
        tracing::debug!(fields = snapshot.len(), "snapshot built");
        snapshot
    }

    fn request_authorization(&self) -> Receiver<AuthorizationStatus> {
        let (tx, rx) = bounded(1);
        self.settings
            .request_authorization_status(Box::new(move |status| {
                let _ = tx.send(status);
            }));
        rx
    }

    fn await_authorization(&self, pending: Receiver<AuthorizationStatus>) -> bool {
        let received = match self.settings_timeout {
            Some(timeout) => pending.recv_timeout(timeout),
            None => pending.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(status) => {
                tracing::debug!(?status, "notification settings resolved");
                status.is_authorized()
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout = ?self.settings_timeout,
                    "notification settings query timed out, reporting disabled"
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("settings provider dropped its callback, reporting disabled");
                false
            }
        }
    }

    fn collect_fields(&self, draft: &mut SnapshotDraft) {
        let host = self.host.as_ref();

        let boot_time = host.uptime().and_then(|uptime| {
            let uptime = chrono::Duration::from_std(uptime)
                .map_err(|e| FieldError::Parse(format!("uptime: {e}")))?;
            Ok((Utc::now() - uptime).to_rfc3339_opts(SecondsFormat::Millis, true))
        });
        draft.insert(
            keys::BOOT_TIME,
            degrade(keys::BOOT_TIME, boot_time, UNKNOWN.to_string()),
        );

        match host.power() {
            Ok(power) => {
                draft.insert(keys::BATTERY_LEVEL, power.level);
                draft.insert(keys::BATTERY_STATE, power.state.as_str());
            }
            Err(e) => {
                log_degraded(keys::BATTERY_LEVEL, &e);
                draft.insert(keys::BATTERY_LEVEL, -1.0);
                draft.insert(keys::BATTERY_STATE, "unknown");
            }
        }

        let identity_fields = [
            (keys::DEVICE_MODEL, host.model()),
            (keys::SYSTEM_VERSION, host.system_version()),
            (keys::DEVICE_NAME, host.device_name()),
            (keys::DEVICE_IDENTIFIER, self.identity.load_or_create()),
            (keys::LOCALE, host.locale()),
            (keys::LANGUAGE, host.language()),
            (keys::TIME_ZONE, host.time_zone()),
        ];
        for (key, value) in identity_fields {
            draft.insert(key, degrade(key, value, UNKNOWN.to_string()));
        }

        match host.display() {
            Ok(geometry) => {
                draft.insert(keys::SCREEN_WIDTH, geometry.width);
                draft.insert(keys::SCREEN_HEIGHT, geometry.height);
                draft.insert(keys::SCREEN_SCALE, geometry.scale);
            }
            Err(e) => {
                log_degraded(keys::SCREEN_WIDTH, &e);
                draft.insert(keys::SCREEN_WIDTH, 0.0);
                draft.insert(keys::SCREEN_HEIGHT, 0.0);
                draft.insert(keys::SCREEN_SCALE, 1.0);
            }
        }

        let orientation = degrade(keys::ORIENTATION, host.orientation(), Orientation::Unknown);
        draft.insert(keys::ORIENTATION, orientation.code());

        if let Some(version) = &self.package.version {
            draft.insert(keys::APP_VERSION, version.as_str());
        }
        if let Some(build) = &self.package.build {
            draft.insert(keys::APP_BUILD, build.as_str());
        }

        draft.insert(keys::HAS_DUOLINGO, self.probe.can_open(&self.probe_scheme));
    }
}

fn degrade<T>(field: &str, value: Result<T, FieldError>, fallback: T) -> T {
    value.unwrap_or_else(|e| {
        log_degraded(field, &e);
        fallback
    })
}

fn log_degraded(field: &str, error: &FieldError) {
    tracing::warn!(field, error = %error, "field unavailable, using fallback");
}
