use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::catalog::CatalogConfig;
use crate::playback::PlaybackConfig;
use crate::relay::RelayConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub catalog: CatalogConfig,
    pub relay: RelayConfig,
    pub playback: PlaybackConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// How the front-end adapter authenticates. Required so that an open
/// command surface is always an explicit choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key for `api_key`
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// No credentials checked; loopback listeners only
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey => "api_key",
        }
    }
}

/// Database configuration. Cooldown records and the audit log share one file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("clipcast.db")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: SanitizedAuthConfig,
    pub catalog: CatalogConfig,
    pub relay: SanitizedRelayConfig,
    pub playback: PlaybackConfig,
}

/// Auth section without the key.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: &'static str,
}

/// Relay config with the output sink and header values hidden.
/// The sink URL usually embeds a stream key.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRelayConfig {
    pub output_configured: bool,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub request_headers: Vec<String>,
    pub probe_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub ffmpeg_log_level: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str(),
            },
            catalog: config.catalog.clone(),
            relay: SanitizedRelayConfig {
                output_configured: !config.relay.output_url.is_empty(),
                ffmpeg_path: config.relay.ffmpeg_path.clone(),
                ffprobe_path: config.relay.ffprobe_path.clone(),
                request_headers: config.relay.request_headers.keys().cloned().collect(),
                probe_timeout_secs: config.relay.probe_timeout_secs,
                stop_timeout_secs: config.relay.stop_timeout_secs,
                ffmpeg_log_level: config.relay.ffmpeg_log_level.clone(),
            },
            playback: config.playback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::UserId;

    fn config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("adapter-secret".to_string()),
            },
            catalog: CatalogConfig::new("https://api.example/clips"),
            relay: RelayConfig::new("rtmp://live.example/app/super-secret")
                .with_header("Referer", "https://private.example"),
            playback: PlaybackConfig::new(UserId(1)),
        }
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let sanitized = SanitizedConfig::from(&config());
        let json = serde_json::to_string(&sanitized).unwrap();

        assert!(!json.contains("super-secret"));
        assert!(!json.contains("adapter-secret"));
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(!json.contains("private.example"));
        assert!(json.contains("Referer"));
        assert!(sanitized.relay.output_configured);
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.host.to_string(), "0.0.0.0");
        assert_eq!(server.port, 8080);
        assert_eq!(DatabaseConfig::default().path, PathBuf::from("clipcast.db"));
    }
}
