//! Recurring schedule registry.
//!
//! Schedules are keyed by identifier. Registering an identifier that is
//! already present replaces the old schedule, so repeated registration at
//! every start leaves exactly one recurring entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Identifier the agent registers its refresh schedule under.
pub const DEFAULT_SCHEDULE_ID: &str = "device-telemetry.refresh";

/// Interval of the refresh schedule when none is configured.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(15 * 60);

struct ScheduleEntry {
    interval: Duration,
    task: JoinHandle<()>,
}

/// Identifier-keyed set of recurring jobs.
#[derive(Default)]
pub struct ScheduleRegistry {
    entries: Mutex<HashMap<String, ScheduleEntry>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `interval`, first firing one interval from now.
    ///
    /// Replaces any schedule already registered under `id`. Must be called
    /// from within a Tokio runtime.
    pub fn register<F, Fut>(&self, id: &str, interval: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule_id = id.to_string();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::debug!(schedule = %schedule_id, "schedule fired");
                job().await;
            }
        });

        let previous = self
            .entries()
            .insert(id.to_string(), ScheduleEntry { interval, task });

        match previous {
            Some(old) => {
                old.task.abort();
                tracing::info!(schedule = id, ?interval, "schedule replaced");
            }
            None => tracing::info!(schedule = id, ?interval, "schedule registered"),
        }
    }

    /// Stop and remove a schedule. Returns whether it existed.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.entries().remove(id);
        match removed {
            Some(entry) => {
                entry.task.abort();
                tracing::info!(schedule = id, "schedule cancelled");
                true
            }
            None => false,
        }
    }

    /// Stop every schedule.
    pub fn cancel_all(&self) {
        for (_, entry) in self.entries().drain() {
            entry.task.abort();
        }
    }

    /// Number of registered schedules.
    pub fn active_count(&self) -> usize {
        self.entries().len()
    }

    pub fn interval(&self, id: &str) -> Option<Duration> {
        self.entries().get(id).map(|e| e.interval)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ScheduleEntry>> {
        // A panicking job never holds this lock, so the map is still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ScheduleRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let registry = ScheduleRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            registry.register(
                DEFAULT_SCHEDULE_ID,
                Duration::from_secs(3600),
                counting_job(counter.clone()),
            );
        }

        assert_eq!(registry.active_count(), 1);
        assert_eq!(
            registry.interval(DEFAULT_SCHEDULE_ID),
            Some(Duration::from_secs(3600))
        );
    }

    #[tokio::test]
    async fn test_distinct_ids_coexist() {
        let registry = ScheduleRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register("a", Duration::from_secs(60), counting_job(counter.clone()));
        registry.register("b", Duration::from_secs(60), counting_job(counter));
        assert_eq!(registry.active_count(), 2);

        assert!(registry.cancel("a"));
        assert!(!registry.cancel("a"));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_schedule_stops_firing() {
        let registry = ScheduleRegistry::new();
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));

        registry.register("job", Duration::from_secs(10), counting_job(old.clone()));
        registry.register("job", Duration::from_secs(10), counting_job(new.clone()));

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 3);
    }
}
