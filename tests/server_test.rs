//! Integration tests for the wake listener and the reference collector

#[cfg(feature = "server")]
mod server_tests {
    use device_telemetry_agent::host::{
        AuthorizationStatus, CapabilityProbe, DisplayGeometry, FieldError, FixedSettings, HostInfo,
        InstallationIdentity, PowerState,
    };
    use device_telemetry_agent::server::{run_collector, run_wake_listener, CollectorServerConfig};
    use device_telemetry_agent::{
        CollectorEndpoint, ExecutionWindow, LocalWindowHost, SnapshotBuilder, Submitter,
        TelemetryAgent,
    };
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_dir() -> PathBuf {
        let dir = std::env::temp_dir()
            .join("device-telemetry-server-test")
            .join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn collector_config(dir: &std::path::Path) -> CollectorServerConfig {
        CollectorServerConfig::new(0, dir.join("device_data.jsonl"), dir.join("output"))
    }

    struct StubHost;

    impl HostInfo for StubHost {
        fn uptime(&self) -> Result<Duration, FieldError> {
            Ok(Duration::from_secs(60))
        }
        fn power(&self) -> Result<PowerState, FieldError> {
            Err(FieldError::Unavailable("no battery".to_string()))
        }
        fn model(&self) -> Result<String, FieldError> {
            Ok("Stub".to_string())
        }
        fn system_version(&self) -> Result<String, FieldError> {
            Ok("StubOS 1".to_string())
        }
        fn device_name(&self) -> Result<String, FieldError> {
            Ok("stub".to_string())
        }
        fn locale(&self) -> Result<String, FieldError> {
            Ok("en_US".to_string())
        }
        fn language(&self) -> Result<String, FieldError> {
            Ok("en-US".to_string())
        }
        fn time_zone(&self) -> Result<String, FieldError> {
            Ok("UTC".to_string())
        }
        fn display(&self) -> Result<DisplayGeometry, FieldError> {
            Ok(DisplayGeometry {
                width: 1920.0,
                height: 1080.0,
                scale: 1.0,
            })
        }
    }

    struct NoProbe;

    impl CapabilityProbe for NoProbe {
        fn can_open(&self, _scheme: &str) -> bool {
            false
        }
    }

    fn agent_for(collector: &str, dir: &std::path::Path) -> TelemetryAgent {
        let builder = SnapshotBuilder::new(
            Arc::new(StubHost),
            Arc::new(FixedSettings(AuthorizationStatus::Authorized)),
            Arc::new(NoProbe),
            InstallationIdentity::new(dir.join("data")),
        );
        let endpoint = CollectorEndpoint::parse(collector).unwrap();
        let submitter = Submitter::new(endpoint, Duration::from_secs(5)).unwrap();
        let window = ExecutionWindow::new(Arc::new(LocalWindowHost::new(None)));
        TelemetryAgent::new(builder, submitter, window)
    }

    #[tokio::test]
    async fn test_collector_health_endpoint() {
        let dir = test_dir();
        let (addr, shutdown_tx) = run_collector(collector_config(&dir))
            .await
            .expect("Failed to start collector");

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_collector_stores_device_data() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let data_file = config.data_file.clone();
        let (addr, shutdown_tx) = run_collector(config).await.expect("Failed to start collector");

        let client = reqwest::Client::new();
        let url = format!("http://{}/flask-api/device-data", addr);
        for level in [0.5, 0.75] {
            let response = client
                .post(&url)
                .json(&serde_json::json!({"batteryLevel": level, "deviceName": "test"}))
                .send()
                .await
                .expect("Failed to send request");
            assert_eq!(response.status(), 200);
            let body: serde_json::Value = response.json().await.unwrap();
            assert_eq!(body["message"], "Device data stored successfully");
        }

        let content = std::fs::read_to_string(&data_file).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["batteryLevel"], 0.75);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_collector_rejects_empty_and_malformed_bodies() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let data_file = config.data_file.clone();
        let (addr, shutdown_tx) = run_collector(config).await.expect("Failed to start collector");

        let client = reqwest::Client::new();
        let url = format!("http://{}/flask-api/device-data", addr);

        let response = client
            .post(&url)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Missing JSON data");

        let response = client
            .post(&url)
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON data"));

        assert!(!data_file.exists());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_collector_clear_endpoint() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let output_dir = config.output_dir.clone();
        let (addr, shutdown_tx) = run_collector(config).await.expect("Failed to start collector");

        let client = reqwest::Client::new();
        let url = format!("http://{}/flask-api/clear", addr);

        let response = client.delete(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Output directory does not exist");

        std::fs::create_dir_all(output_dir.join("nested")).unwrap();
        std::fs::write(output_dir.join("a.json"), "{}").unwrap();
        std::fs::write(output_dir.join("b.json"), "{}").unwrap();

        let response = client.delete(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Output directory cleared");

        assert!(!output_dir.join("a.json").exists());
        assert!(!output_dir.join("b.json").exists());
        // Subdirectories are left alone
        assert!(output_dir.join("nested").is_dir());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_wake_without_marker_submits_nothing() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let data_file = config.data_file.clone();
        let (collector_addr, collector_tx) =
            run_collector(config).await.expect("Failed to start collector");

        let agent = agent_for(&format!("http://{}", collector_addr), &dir);
        let (wake_addr, wake_tx) = run_wake_listener(agent.clone(), 0)
            .await
            .expect("Failed to start wake listener");

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/wake", wake_addr))
            .json(&serde_json::json!({"aps": {"alert": "hello"}}))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["result"], "noData");
        assert!(!data_file.exists());
        assert_eq!(agent.activity().stats().wake_runs, 1);

        let _ = wake_tx.send(());
        let _ = collector_tx.send(());
    }

    #[tokio::test]
    async fn test_wake_with_unparseable_body_is_acknowledged() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let data_file = config.data_file.clone();
        let (collector_addr, collector_tx) =
            run_collector(config).await.expect("Failed to start collector");

        let agent = agent_for(&format!("http://{}", collector_addr), &dir);
        let (wake_addr, wake_tx) = run_wake_listener(agent.clone(), 0)
            .await
            .expect("Failed to start wake listener");

        let client = reqwest::Client::new();
        let url = format!("http://{}/wake", wake_addr);
        let requests = [
            ("text/plain", "{}"),
            ("application/json", "not json"),
            ("application/json", ""),
        ];
        for (content_type, body) in requests {
            let response = client
                .post(&url)
                .header("Content-Type", content_type)
                .body(body)
                .send()
                .await
                .unwrap();

            assert_eq!(response.status(), 200, "{content_type} {body:?}");
            let reply: serde_json::Value = response.json().await.unwrap();
            assert_eq!(reply["result"], "noData");
        }

        let stats = agent.activity().stats();
        assert_eq!(stats.wake_runs, 3);
        assert_eq!(stats.no_data, 3);
        assert!(!data_file.exists());

        let _ = wake_tx.send(());
        let _ = collector_tx.send(());
    }

    #[tokio::test]
    async fn test_wake_with_marker_delivers_snapshot() {
        let dir = test_dir();
        let config = collector_config(&dir);
        let data_file = config.data_file.clone();
        let (collector_addr, collector_tx) =
            run_collector(config).await.expect("Failed to start collector");

        let agent = agent_for(&format!("http://{}", collector_addr), &dir);
        let (wake_addr, wake_tx) = run_wake_listener(agent, 0)
            .await
            .expect("Failed to start wake listener");

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/wake", wake_addr))
            .json(&serde_json::json!({"aps": {"content-available": 1}}))
            .send()
            .await
            .unwrap();

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["result"], "newData");

        let content = std::fs::read_to_string(&data_file).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["deviceModel"], "Stub");
        assert_eq!(line["notificationsEnabled"], true);

        let _ = wake_tx.send(());
        let _ = collector_tx.send(());
    }
}
