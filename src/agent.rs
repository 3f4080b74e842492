//! Trigger-to-submission pipeline.
//!
//! [`TelemetryAgent`] owns everything a run needs and is cheap to clone.
//! Each entry path ends up in [`TelemetryAgent::dispatch`], which builds a
//! fresh snapshot on a blocking worker, submits it, and reports one
//! [`FetchResult`] once the collector has answered or the run has failed.

use crate::activity::{create_shared_log, create_shared_log_with_persistence, SharedActivityLog};
use crate::config::{Config, DEFAULT_MANUAL_DELAY};
use crate::host::{
    FixedSettings, InstallationIdentity, PackageMetadata, SchemeHandlerProbe, SettingsProvider,
    SystemHost, SystemSettingsProvider,
};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use crate::submit::{CollectorEndpoint, SubmissionOutcome, SubmitError, Submitter};
use crate::trigger::{FetchResult, ScheduleRegistry, Trigger, TriggerKind, WakeSignal};
use crate::window::{ExecutionWindow, LocalWindowHost};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The background telemetry agent.
#[derive(Clone)]
pub struct TelemetryAgent {
    builder: Arc<SnapshotBuilder>,
    submitter: Submitter,
    window: ExecutionWindow,
    manual_delay: Duration,
    activity: SharedActivityLog,
}

impl TelemetryAgent {
    pub fn new(builder: SnapshotBuilder, submitter: Submitter, window: ExecutionWindow) -> Self {
        Self {
            builder: Arc::new(builder),
            submitter,
            window,
            manual_delay: DEFAULT_MANUAL_DELAY,
            activity: create_shared_log(),
        }
    }

    /// Wire the agent to the real host as described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, SubmitError> {
        let endpoint = CollectorEndpoint::parse(&config.collector_url)?;
        let submitter = Submitter::new(endpoint, config.request_timeout)?;

        let settings: Arc<dyn SettingsProvider> = match config.notification_override {
            Some(status) => Arc::new(FixedSettings(status)),
            None => Arc::new(SystemSettingsProvider::new()),
        };

        let builder = SnapshotBuilder::new(
            Arc::new(SystemHost::new()),
            settings,
            Arc::new(SchemeHandlerProbe::new()),
            InstallationIdentity::new(&config.data_path),
        )
        .with_package(PackageMetadata::current())
        .with_probe_scheme(config.probe_scheme.clone())
        .with_settings_timeout(config.settings_timeout);

        let window = ExecutionWindow::new(Arc::new(LocalWindowHost::new(config.window_budget)));

        Ok(Self::new(builder, submitter, window)
            .with_manual_delay(config.manual_delay)
            .with_activity(create_shared_log_with_persistence(config.activity_path())))
    }

    pub fn with_manual_delay(mut self, delay: Duration) -> Self {
        self.manual_delay = delay;
        self
    }

    pub fn with_activity(mut self, activity: SharedActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn activity(&self) -> &SharedActivityLog {
        &self.activity
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    /// Build a snapshot without submitting it. Blocks while the settings
    /// query resolves, so keep it off async worker threads.
    pub fn collect_snapshot(&self) -> Snapshot {
        self.builder.build()
    }

    /// Entry point for the recurring schedule.
    pub async fn handle_scheduled(&self, schedule_id: &str) -> FetchResult {
        self.dispatch(Trigger::Scheduled {
            schedule_id: schedule_id.to_string(),
        })
        .await
    }

    /// Entry point for inbound wake signals.
    pub async fn handle_wake(&self, signal: WakeSignal) -> FetchResult {
        self.dispatch(Trigger::Wake(signal)).await
    }

    /// Handle for the user-facing "run now" action.
    pub fn manual_trigger(&self) -> ManualTrigger {
        ManualTrigger {
            agent: self.clone(),
        }
    }

    /// Register the recurring refresh under `schedule_id`, replacing any
    /// earlier registration with the same identifier.
    pub fn schedule(&self, registry: &ScheduleRegistry, schedule_id: &str, interval: Duration) {
        let agent = self.clone();
        let id = schedule_id.to_string();
        registry.register(schedule_id, interval, move || {
            let agent = agent.clone();
            let id = id.clone();
            async move {
                agent.handle_scheduled(&id).await;
            }
        });
    }

    /// Run the pipeline for one trigger and return its completion signal.
    pub async fn dispatch(&self, trigger: Trigger) -> FetchResult {
        let kind = trigger.kind();
        self.activity.record_trigger(kind);

        let result = match &trigger {
            Trigger::Wake(signal) if !signal.content_available() => {
                tracing::info!(trigger = %kind, "wake signal without content-available marker");
                FetchResult::NoData
            }
            _ if trigger.needs_window() => self.run_in_window(kind).await,
            _ => self.clone().run_pipeline(kind).await,
        };

        self.activity.record_result(result);
        if let Err(e) = self.activity.save() {
            tracing::warn!(error = %e, "could not save activity stats");
        }
        tracing::info!(trigger = %kind, %result, "trigger completed");
        result
    }

    async fn run_in_window(&self, kind: TriggerKind) -> FetchResult {
        let handle = self.window.acquire(&format!("{kind} telemetry"));
        let mut pipeline = tokio::spawn(self.clone().run_pipeline(kind));

        let result = tokio::select! {
            joined = &mut pipeline => joined.unwrap_or_else(|e| {
                tracing::error!(trigger = %kind, error = %e, "pipeline task failed");
                FetchResult::Failed
            }),
            _ = handle.expired() => {
                handle.begin_expiry();
                // The run keeps going in the background; its result is no
                // longer reported to the host.
                tracing::warn!(trigger = %kind, "execution window expired before the pipeline finished");
                FetchResult::Failed
            }
        };

        self.window.release(handle);
        result
    }

    async fn run_pipeline(self, kind: TriggerKind) -> FetchResult {
        let builder = Arc::clone(&self.builder);
        let snapshot = match tokio::task::spawn_blocking(move || builder.build()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(trigger = %kind, error = %e, "snapshot builder failed");
                return FetchResult::Failed;
            }
        };

        match self.submitter.submit(snapshot).outcome().await {
            SubmissionOutcome::Delivered { status } => {
                tracing::info!(trigger = %kind, status, "snapshot delivered");
                FetchResult::NewData
            }
            SubmissionOutcome::Failed(e) => {
                tracing::warn!(trigger = %kind, error = %e, "snapshot not delivered");
                FetchResult::Failed
            }
        }
    }
}

/// The manual "run now" action, handed to the UI layer at construction.
#[derive(Clone)]
pub struct ManualTrigger {
    agent: TelemetryAgent,
}

impl ManualTrigger {
    /// Schedule a run after the manual delay and return immediately.
    ///
    /// The returned handle resolves to the run's completion signal; dropping
    /// it does not cancel the run. Must be called from within a Tokio runtime.
    pub fn fire(&self) -> JoinHandle<FetchResult> {
        let agent = self.agent.clone();
        tracing::info!(delay = ?agent.manual_delay, "manual run scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(agent.manual_delay).await;
            agent.dispatch(Trigger::Manual).await
        })
    }

    /// Fire and wait for the completion signal.
    pub async fn run(&self) -> FetchResult {
        self.fire().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "manual run task failed");
            FetchResult::Failed
        })
    }
}
