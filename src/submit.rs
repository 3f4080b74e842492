//! Submission of snapshots to the collector endpoint.
//!
//! A submission is one POST of one snapshot. It is serialized up front, sent
//! on a spawned task, and its outcome is only ever logged and reported back;
//! nothing is retried or stored for later.

use crate::snapshot::Snapshot;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Path of the device data endpoint on the collector host.
pub const DEVICE_DATA_PATH: &str = "/flask-api/device-data";

/// Collector used when no configuration overrides it.
pub const DEFAULT_COLLECTOR_URL: &str = "https://collector.example.com";

/// Longest response body echoed into the logs.
const MAX_LOGGED_BODY: usize = 512;

/// Submission error types.
#[derive(Debug)]
pub enum SubmitError {
    /// The collector URL cannot be used
    InvalidEndpoint(String),
    /// The HTTP client could not be created
    Client(String),
    /// Snapshot serialization failed; nothing was sent
    Serialization(String),
    /// DNS, TLS, connection or timeout failure
    Transport(String),
    /// Collector answered with a non-2xx status
    Server { status: u16, body: String },
    /// The submission task ended without producing an outcome
    Aborted(String),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::InvalidEndpoint(msg) => write!(f, "Invalid collector endpoint: {msg}"),
            SubmitError::Client(msg) => write!(f, "HTTP client error: {msg}"),
            SubmitError::Serialization(msg) => write!(f, "Snapshot serialization error: {msg}"),
            SubmitError::Transport(msg) => write!(f, "Transport error: {msg}"),
            SubmitError::Server { status, body } => {
                write!(f, "Collector returned {status}: {body}")
            }
            SubmitError::Aborted(msg) => write!(f, "Submission aborted: {msg}"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Validated collector endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorEndpoint {
    base: Url,
    device_data: Url,
}

impl CollectorEndpoint {
    /// Parse a collector base URL such as `https://collector.example.com`.
    ///
    /// Fails before any network I/O when the URL is malformed, has no host,
    /// or uses a scheme other than `http`/`https`.
    pub fn parse(base: &str) -> Result<Self, SubmitError> {
        let parsed = Url::parse(base.trim())
            .map_err(|e| SubmitError::InvalidEndpoint(format!("'{base}': {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SubmitError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        if parsed.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(SubmitError::InvalidEndpoint(format!("'{base}' has no host")));
        }

        let device_data = Url::parse(&format!(
            "{}{}",
            parsed.as_str().trim_end_matches('/'),
            DEVICE_DATA_PATH
        ))
        .map_err(|e| SubmitError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            base: parsed,
            device_data,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Full URL snapshots are posted to.
    pub fn device_data_url(&self) -> &Url {
        &self.device_data
    }
}

/// Result of one submission attempt.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Collector accepted the snapshot with a 2xx status
    Delivered { status: u16 },
    Failed(SubmitError),
}

impl SubmissionOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SubmissionOutcome::Delivered { .. })
    }
}

/// In-flight submission.
///
/// Dropping the handle does not cancel the request; it finishes in the
/// background and only its log lines remain.
pub struct SubmissionHandle {
    state: HandleState,
}

enum HandleState {
    Finished(SubmissionOutcome),
    Running(JoinHandle<SubmissionOutcome>),
}

impl SubmissionHandle {
    fn finished(outcome: SubmissionOutcome) -> Self {
        Self {
            state: HandleState::Finished(outcome),
        }
    }

    /// Wait for the request to complete.
    pub async fn outcome(self) -> SubmissionOutcome {
        match self.state {
            HandleState::Finished(outcome) => outcome,
            HandleState::Running(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => SubmissionOutcome::Failed(SubmitError::Aborted(e.to_string())),
            },
        }
    }
}

/// Posts snapshots to the collector.
#[derive(Clone)]
pub struct Submitter {
    endpoint: CollectorEndpoint,
    client: reqwest::Client,
}

impl Submitter {
    /// Create a submitter with a per-request timeout.
    pub fn new(endpoint: CollectorEndpoint, timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Client(e.to_string()))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &CollectorEndpoint {
        &self.endpoint
    }

    /// Serialize and send a snapshot without waiting for the response.
    ///
    /// Must be called from within a Tokio runtime. Serialization failures are
    /// reported through the returned handle without touching the network.
    pub fn submit(&self, snapshot: Snapshot) -> SubmissionHandle {
        let body = match snapshot.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "snapshot serialization failed, nothing sent");
                return SubmissionHandle::finished(SubmissionOutcome::Failed(
                    SubmitError::Serialization(e.to_string()),
                ));
            }
        };
        drop(snapshot);

        let request = self
            .client
            .post(self.endpoint.device_data_url().clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let url = self.endpoint.device_data_url().to_string();

        let task = tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(%url, error = %e, "snapshot submission failed");
                    return SubmissionOutcome::Failed(SubmitError::Transport(e.to_string()));
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            let body = truncate(&body, MAX_LOGGED_BODY);

            if status.is_success() {
                tracing::info!(%url, status = status.as_u16(), %body, "snapshot submitted");
                SubmissionOutcome::Delivered {
                    status: status.as_u16(),
                }
            } else {
                tracing::warn!(%url, status = status.as_u16(), %body, "collector rejected snapshot");
                SubmissionOutcome::Failed(SubmitError::Server {
                    status: status.as_u16(),
                    body,
                })
            }
        });

        SubmissionHandle {
            state: HandleState::Running(task),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotDraft;

    #[test]
    fn test_endpoint_url() {
        let endpoint = CollectorEndpoint::parse("https://collector.example.com").unwrap();
        assert_eq!(
            endpoint.device_data_url().as_str(),
            "https://collector.example.com/flask-api/device-data"
        );

        let endpoint = CollectorEndpoint::parse("http://127.0.0.1:9000/").unwrap();
        assert_eq!(
            endpoint.device_data_url().as_str(),
            "http://127.0.0.1:9000/flask-api/device-data"
        );
    }

    #[test]
    fn test_malformed_endpoint_fails_fast() {
        assert!(matches!(
            CollectorEndpoint::parse("not a url"),
            Err(SubmitError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            CollectorEndpoint::parse("ftp://collector.example.com"),
            Err(SubmitError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            CollectorEndpoint::parse("file:///tmp/collector"),
            Err(SubmitError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_error_display() {
        let err = SubmitError::Server {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Collector returned 500: boom");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = CollectorEndpoint::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        let submitter = Submitter::new(endpoint, Duration::from_secs(2)).unwrap();

        let outcome = submitter
            .submit(SnapshotDraft::new().resolve(true))
            .outcome()
            .await;
        assert!(matches!(
            outcome,
            SubmissionOutcome::Failed(SubmitError::Transport(_))
        ));
    }
}
