//! Background execution windows.
//!
//! Work started by a scheduled or pushed trigger runs inside a window granted
//! by the host. The host bounds the window with a deadline; when it passes
//! the window must be handed back at once, whatever is still in flight.
//!
//! A [`WindowHandle`] returns its grant exactly once: through an explicit
//! release, through expiry handling, or on drop, whichever comes first.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Budget granted by [`LocalWindowHost`] when none is configured.
pub const DEFAULT_WINDOW_BUDGET: Duration = Duration::from_secs(30);

/// Identifier of one grant issued by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantId(pub u64);

/// A grant of background execution time.
#[derive(Debug, Clone, Copy)]
pub struct WindowGrant {
    pub id: GrantId,
    /// When the host withdraws the window. `None` means no deadline.
    pub expires_at: Option<Instant>,
}

/// The environment that hands out background execution time.
pub trait WindowHost: Send + Sync {
    fn begin(&self, reason: &str) -> WindowGrant;

    /// Return a grant. Called once per grant.
    fn end(&self, id: GrantId);
}

/// Lifecycle state of a window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Inactive,
    Active,
    Expiring,
}

const INACTIVE: u8 = 0;
const ACTIVE: u8 = 1;
const EXPIRING: u8 = 2;

/// Acquires and releases windows against a host.
#[derive(Clone)]
pub struct ExecutionWindow {
    host: Arc<dyn WindowHost>,
}

impl ExecutionWindow {
    pub fn new(host: Arc<dyn WindowHost>) -> Self {
        Self { host }
    }

    /// Ask the host for a window before starting background work.
    pub fn acquire(&self, reason: &str) -> WindowHandle {
        let grant = self.host.begin(reason);
        tracing::debug!(grant = grant.id.0, reason, "execution window acquired");
        WindowHandle {
            host: Arc::clone(&self.host),
            grant: grant.id,
            reason: reason.to_string(),
            expires_at: grant.expires_at,
            state: AtomicU8::new(ACTIVE),
        }
    }

    /// Hand a window back. Releasing an already inactive handle does nothing.
    pub fn release(&self, handle: WindowHandle) {
        handle.release();
    }
}

/// A window held by one pipeline invocation.
pub struct WindowHandle {
    host: Arc<dyn WindowHost>,
    grant: GrantId,
    reason: String,
    expires_at: Option<Instant>,
    state: AtomicU8,
}

impl WindowHandle {
    pub fn state(&self) -> WindowState {
        match self.state.load(Ordering::SeqCst) {
            ACTIVE => WindowState::Active,
            EXPIRING => WindowState::Expiring,
            _ => WindowState::Inactive,
        }
    }

    pub fn grant(&self) -> GrantId {
        self.grant
    }

    /// Resolves when the host deadline passes; never resolves without one.
    pub async fn expired(&self) {
        match self.expires_at {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Mark the window as winding down. Returns `false` if it was not active.
    pub fn begin_expiry(&self) -> bool {
        self.state
            .compare_exchange(ACTIVE, EXPIRING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Return the grant to the host if it is still held.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn release(&self) -> bool {
        let previous = self.state.swap(INACTIVE, Ordering::SeqCst);
        if previous == INACTIVE {
            return false;
        }
        self.host.end(self.grant);
        tracing::debug!(grant = self.grant.0, reason = %self.reason, "execution window released");
        true
    }
}

impl Drop for WindowHandle {
    fn drop(&mut self) {
        if self.release() {
            tracing::debug!(grant = self.grant.0, "execution window released on drop");
        }
    }
}

/// In-process host that grants every window the same fixed budget.
#[derive(Debug)]
pub struct LocalWindowHost {
    budget: Option<Duration>,
    next_id: AtomicU64,
    active: Mutex<HashSet<GrantId>>,
    released: AtomicU64,
}

impl LocalWindowHost {
    /// `None` grants windows without a deadline.
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            budget,
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashSet::new()),
            released: AtomicU64::new(0),
        }
    }

    /// Grants currently held.
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|set| set.len()).unwrap_or(0)
    }

    /// Grants returned so far.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for LocalWindowHost {
    fn default() -> Self {
        Self::new(Some(DEFAULT_WINDOW_BUDGET))
    }
}

impl WindowHost for LocalWindowHost {
    fn begin(&self, reason: &str) -> WindowGrant {
        let id = GrantId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut active) = self.active.lock() {
            active.insert(id);
        }
        tracing::trace!(grant = id.0, reason, "window granted");
        WindowGrant {
            id,
            expires_at: self.budget.map(|budget| Instant::now() + budget),
        }
    }

    fn end(&self, id: GrantId) {
        let known = self
            .active
            .lock()
            .map(|mut active| active.remove(&id))
            .unwrap_or(false);
        if known {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::warn!(grant = id.0, "release of unknown or already released window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(budget: Option<Duration>) -> (Arc<LocalWindowHost>, ExecutionWindow) {
        let host = Arc::new(LocalWindowHost::new(budget));
        let window = ExecutionWindow::new(host.clone());
        (host, window)
    }

    #[test]
    fn test_release_is_idempotent() {
        let (host, window) = window(None);
        let handle = window.acquire("test");
        assert_eq!(handle.state(), WindowState::Active);
        assert_eq!(host.active_count(), 1);

        assert!(handle.release());
        assert!(!handle.release());
        assert_eq!(handle.state(), WindowState::Inactive);
        drop(handle);

        assert_eq!(host.active_count(), 0);
        assert_eq!(host.released_count(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let (host, window) = window(None);
        {
            let _handle = window.acquire("scoped");
            assert_eq!(host.active_count(), 1);
        }
        assert_eq!(host.active_count(), 0);
        assert_eq!(host.released_count(), 1);
    }

    #[test]
    fn test_expiring_then_release() {
        let (host, window) = window(None);
        let handle = window.acquire("expiry");
        assert!(handle.begin_expiry());
        assert_eq!(handle.state(), WindowState::Expiring);
        assert!(!handle.begin_expiry());

        window.release(handle);
        assert_eq!(host.released_count(), 1);
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_grants_are_distinct() {
        let (host, window) = window(None);
        let a = window.acquire("a");
        let b = window.acquire("b");
        assert_ne!(a.grant(), b.grant());
        assert_eq!(host.active_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_resolves_after_budget() {
        let (_host, window) = window(Some(Duration::from_millis(20)));
        let handle = window.acquire("budget");
        tokio::time::timeout(Duration::from_secs(2), handle.expired())
            .await
            .expect("window should expire");
    }

    #[tokio::test]
    async fn test_no_budget_never_expires() {
        let (_host, window) = window(None);
        let handle = window.acquire("unbounded");
        let result = tokio::time::timeout(Duration::from_millis(30), handle.expired()).await;
        assert!(result.is_err());
    }
}
