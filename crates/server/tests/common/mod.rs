//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real playback orchestrator with mock catalog, probe and relay
//! processes injected, and real SQLite stores in a temp directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use clipcast_core::{
    catalog::CatalogConfig,
    config::{AuthConfig, AuthMethod, DatabaseConfig, ServerConfig},
    create_authenticator,
    create_audit_system, create_playback_system,
    relay::{DurationProbe, RelayConfig, RelayLauncher},
    testing::{MockCatalog, MockProbe, MockRelayLauncher},
    AuditStore, CandidateResolver, CatalogSource, Config, CooldownStore, PlaybackConfig,
    PlaybackHandle, SqliteAuditStore, SqliteCooldownStore, UserId,
};
use clipcast_server::api::USER_ID_HEADER;

/// Re-export fixtures for test convenience
pub use clipcast_core::testing::fixtures;

/// The privileged identity used by every fixture.
pub const ADMIN: UserId = UserId(1000);

/// Retry backoff used by every fixture, in milliseconds.
pub const BACKOFF_MS: u64 = 50;

/// Key the fixture's front-end adapter authenticates with.
pub const API_KEY: &str = "test-adapter-key";

/// Stream key embedded in the output sink; must never leak through the API.
pub const STREAM_KEY: &str = "live_sk_do_not_leak";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_advance() {
///     let fixture = TestFixture::new(&["Intro"]).await;
///     // Requests carry the fixture's API key unless sent via `send_with_key`
///     let response = fixture.post_as("/api/v1/playback/advance", UserId(5)).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock catalog - configure the listing
    pub catalog: Arc<MockCatalog>,
    /// Mock probe - mark locators unplayable
    pub probe: Arc<MockProbe>,
    /// Mock relay launcher - finish or inspect relays
    pub launcher: Arc<MockRelayLauncher>,
    /// Playback handle, for direct status checks
    pub playback: PlaybackHandle,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose catalog lists `titles`, all playable.
    pub async fn new(titles: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let catalog = Arc::new(MockCatalog::with_candidates(fixtures::catalog(titles)));
        let probe = Arc::new(MockProbe::new());
        let launcher = Arc::new(MockRelayLauncher::new());

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(API_KEY.to_string()),
            },
            catalog: CatalogConfig::new("http://catalog.test/clips"),
            relay: RelayConfig::new(format!("rtmp://sink.test/live/{}", STREAM_KEY))
                .with_header("Referer", "https://origin.test"),
            playback: PlaybackConfig::new(ADMIN).with_retry_backoff_ms(BACKOFF_MS),
        };

        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let cooldowns: Arc<dyn CooldownStore> = Arc::new(
            SqliteCooldownStore::new(&db_path).expect("Failed to create cooldown store"),
        );

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let resolver = CandidateResolver::new(
            Arc::clone(&catalog) as Arc<dyn CatalogSource>,
            Arc::clone(&probe) as Arc<dyn DurationProbe>,
        );
        let (playback, orchestrator) = create_playback_system(
            config.playback.clone(),
            cooldowns,
            resolver,
            Arc::clone(&launcher) as Arc<dyn RelayLauncher>,
            Duration::from_millis(100),
            Some(audit_handle),
        );
        tokio::spawn(orchestrator.run());

        let authenticator =
            create_authenticator(&config.auth).expect("Failed to create authenticator");
        let state = Arc::new(clipcast_server::state::AppState::new(
            config,
            authenticator,
            playback.clone(),
            audit_store,
        ));
        let router = clipcast_server::api::create_router(state);

        Self {
            router,
            catalog,
            probe,
            launcher,
            playback,
            temp_dir,
        }
    }

    /// Send an authenticated GET request without a user id.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, Some(API_KEY)).await
    }

    /// Send an authenticated GET request as `user`.
    pub async fn get_as(&self, path: &str, user: UserId) -> TestResponse {
        self.request("GET", path, Some(user), Some(API_KEY)).await
    }

    /// Send an authenticated POST request as `user`.
    pub async fn post_as(&self, path: &str, user: UserId) -> TestResponse {
        self.request("POST", path, Some(user), Some(API_KEY)).await
    }

    /// Send an authenticated POST request without a user id.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, Some(API_KEY)).await
    }

    /// Send a request with an arbitrary adapter key, or none at all.
    pub async fn send_with_key(
        &self,
        method: &str,
        path: &str,
        user: Option<UserId>,
        key: Option<&str>,
    ) -> TestResponse {
        self.request(method, path, user, key).await
    }

    /// Raw response body as text (for the metrics endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(path)
            .header("authorization", format!("Bearer {}", API_KEY))
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll `GET /api/v1/playback` until `condition` holds.
    pub async fn wait_for_status(&self, condition: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..200 {
            let response = self.get("/api/v1/playback").await;
            if condition(&response.body) {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Playback status never reached the expected state");
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        user: Option<UserId>,
        key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            request_builder = request_builder.header("authorization", format!("Bearer {}", key));
        }
        if let Some(user) = user {
            request_builder = request_builder.header(USER_ID_HEADER, user.to_string());
        }

        let request = request_builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
