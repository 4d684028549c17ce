use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipcast_core::{
    create_audit_system, create_authenticator, create_playback_system, load_config,
    validate_config, AuditEvent, AuditStore, Authenticator, CandidateResolver, CatalogSource, CooldownStore, FfmpegRelay, HttpCatalog,
    SqliteAuditStore, SqliteCooldownStore,
};
use clipcast_core::relay::{DurationProbe, RelayLauncher};

use clipcast_server::api::create_router;
use clipcast_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("CLIPCAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Catalog endpoint: {}", config.catalog.url);
    info!("Privileged user: {}", config.playback.privileged_user_id);

    let authenticator: Arc<dyn Authenticator> =
        create_authenticator(&config.auth).context("Failed to create authenticator")?;
    info!("Using authenticator: {}", authenticator.method_name());

    // Config hash for audit; the output sink and api key are hashed, never logged.
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    let cooldowns: Arc<dyn CooldownStore> = Arc::new(
        SqliteCooldownStore::new(&config.database.path)
            .context("Failed to create cooldown store")?,
    );
    info!("Cooldown store initialized");

    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted audit event");

    let catalog: Arc<dyn CatalogSource> = Arc::new(
        HttpCatalog::new(&config.catalog).context("Failed to create catalog client")?,
    );
    let relay = Arc::new(FfmpegRelay::new(config.relay.clone()));
    info!(
        "Relay using {:?} (probe {:?})",
        config.relay.ffmpeg_path, config.relay.ffprobe_path
    );

    let resolver = CandidateResolver::new(catalog, Arc::clone(&relay) as Arc<dyn DurationProbe>);
    let (playback, orchestrator) = create_playback_system(
        config.playback.clone(),
        cooldowns,
        resolver,
        relay as Arc<dyn RelayLauncher>,
        Duration::from_secs(config.relay.stop_timeout_secs),
        Some(audit_handle.clone()),
    );
    let orchestrator_handle = tokio::spawn(orchestrator.run());
    info!("Playback orchestrator started");

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        playback.clone(),
        audit_store,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The relay must not outlive the service.
    info!("Stopping playback...");
    playback.shutdown().await;
    let _ = orchestrator_handle.await;
    info!("Playback stopped");

    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The writer exits once every AuditHandle is gone. The orchestrator's
    // clone went with its task; the router's state is already dropped.
    drop(playback);
    drop(audit_handle);

    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
