//! Notification settings providers.
//!
//! The settings query is asynchronous: the provider answers on a thread of
//! its own and hands the status to the callback it was given.

use crate::host::types::{AuthorizationCallback, AuthorizationStatus, SettingsProvider};
use std::thread;

/// Asks the desktop session whether notifications can be delivered.
///
/// A user session bus is the delivery channel for desktop notifications, so
/// its presence is treated as an authorization grant.
#[derive(Debug, Clone, Default)]
pub struct SystemSettingsProvider;

impl SystemSettingsProvider {
    pub fn new() -> Self {
        Self
    }

    fn query() -> AuthorizationStatus {
        match std::env::var("DBUS_SESSION_BUS_ADDRESS") {
            Ok(addr) if !addr.trim().is_empty() => AuthorizationStatus::Authorized,
            _ => AuthorizationStatus::NotDetermined,
        }
    }
}

impl SettingsProvider for SystemSettingsProvider {
    fn request_authorization_status(&self, callback: AuthorizationCallback) {
        let spawned = thread::Builder::new()
            .name("settings-query".to_string())
            .spawn(move || callback(Self::query()));

        if let Err(e) = spawned {
            // The callback moved into the failed closure and is gone; the
            // builder's bounded wait turns this into a `false` field.
            tracing::error!(error = %e, "could not start settings query");
        }
    }
}

/// Provider that always answers with the same status, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedSettings(pub AuthorizationStatus);

impl SettingsProvider for FixedSettings {
    fn request_authorization_status(&self, callback: AuthorizationCallback) {
        let status = self.0;
        thread::spawn(move || callback(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_fixed_settings_calls_back() {
        let (tx, rx) = mpsc::channel();
        FixedSettings(AuthorizationStatus::Denied).request_authorization_status(Box::new(
            move |status| {
                let _ = tx.send(status);
            },
        ));

        let status = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(status, AuthorizationStatus::Denied);
    }

    #[test]
    fn test_system_provider_calls_back_once() {
        let (tx, rx) = mpsc::channel();
        SystemSettingsProvider::new().request_authorization_status(Box::new(move |status| {
            let _ = tx.send(status);
        }));

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
