use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Adapter key written into every generated config.
const API_KEY: &str = "startup-adapter-key";

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config. The catalog points at a closed port.
fn minimal_config(port: u16, db_path: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[auth]
method = "api_key"
api_key = "{}"

[catalog]
url = "http://127.0.0.1:1/clips"
timeout_secs = 2

[relay]
output_url = "rtmp://sink.invalid/live/secret_stream_key"

[playback]
privileged_user_id = 1
autostart = false
"#,
        port,
        db_path.display(),
        API_KEY
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_clipcast"))
        .env("CLIPCAST_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Poll the audit endpoint until `event_type` has at least `min` records.
async fn wait_for_audit_total(port: u16, event_type: &str, min: i64) -> i64 {
    let client = Client::new();
    let url = format!(
        "http://127.0.0.1:{}/api/v1/audit?event_type={}",
        port, event_type
    );
    let mut total = 0;
    for _ in 0..100 {
        let json: serde_json::Value = client
            .get(&url)
            .bearer_auth(API_KEY)
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        total = json["total"].as_i64().unwrap_or(0);
        if total >= min {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    total
}

async fn run_failing(config_path: &Path) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_clipcast"))
            .env("CLIPCAST_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&minimal_config(port, &dir.path().join("clipcast.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&minimal_config(port, &dir.path().join("clipcast.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let url = format!("http://127.0.0.1:{}/api/v1/config", port);

    let response = client.get(&url).send().await.expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(&url)
        .bearer_auth(API_KEY)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body = response.text().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["playback"]["privileged_user_id"], 1);
    assert_eq!(json["relay"]["output_configured"], true);
    assert!(!body.contains("secret_stream_key"));
    assert!(!body.contains(API_KEY));
    assert_eq!(json["auth"]["method"], "api_key");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_failing(Path::new("/nonexistent/config.toml")).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_relay_section_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080

[auth]
method = "api_key"
api_key = "k"

[catalog]
url = "http://127.0.0.1:1/clips"

[playback]
privileged_user_id = 1
"#,
    );

    let result = run_failing(config.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_auth_section_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let full = minimal_config(get_available_port(), &dir.path().join("clipcast.db"));
    let without_auth = full.replace(
        &format!("[auth]\nmethod = \"api_key\"\napi_key = \"{}\"\n", API_KEY),
        "",
    );
    assert_ne!(without_auth, full);

    let config = write_config(&without_auth);
    let result = run_failing(config.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_open_auth_on_public_host_exits_with_error() {
    let config = write_config(
        r#"
[server]
host = "0.0.0.0"
port = 8080

[auth]
method = "none"

[catalog]
url = "http://127.0.0.1:1/clips"

[relay]
output_url = "rtmp://sink.invalid/live/key"

[playback]
privileged_user_id = 1
"#,
    );

    let result = run_failing(config.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_catalog_url_exits_with_error() {
    let config = write_config(
        r#"
[auth]
method = "api_key"
api_key = "k"

[catalog]
url = "file:///etc/clips.json"

[relay]
output_url = "rtmp://sink.invalid/live/key"

[playback]
privileged_user_id = 1
"#,
    );

    let result = run_failing(config.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_audit_persists_across_restarts() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("clipcast.db");

    for expected in 1..=2 {
        let port = get_available_port();
        let config = write_config(&minimal_config(port, &db_path));
        let mut server = spawn_server(config.path()).await;
        assert!(
            wait_for_server(port, 40).await,
            "Server did not start in time"
        );

        let total = wait_for_audit_total(port, "service_started", expected).await;
        assert_eq!(total, expected);

        server.kill().await.ok();
    }
}

#[tokio::test]
async fn test_cooldown_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("clipcast.db");
    let client = Client::new();

    // The catalog is unreachable, but the claim is recorded before resolution.
    let port = get_available_port();
    let config = write_config(&minimal_config(port, &db_path));
    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 40).await, "Server did not start in time");

    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/playback/advance", port))
        .bearer_auth(API_KEY)
        .header("X-User-Id", "5")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 502);
    server.kill().await.ok();
    let _ = server.wait().await;

    let port = get_available_port();
    let config = write_config(&minimal_config(port, &db_path));
    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 40).await, "Server did not start in time");

    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/playback/advance", port))
        .bearer_auth(API_KEY)
        .header("X-User-Id", "5")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));

    server.kill().await.ok();
}
