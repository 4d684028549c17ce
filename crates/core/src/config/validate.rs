use super::{
    types::{AuthMethod, Config},
    ConfigError,
};
use crate::playback::{MAX_COOLDOWN_SECS, MAX_RETRY_BACKOFF_MS};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - API key auth has a key; auth `none` only on a loopback host
/// - Catalog URL is http(s)
/// - Relay output sink is set, probe/stop timeouts are positive
/// - Retry backoff is positive and at most an hour, cooldown at most 30 days
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    match config.auth.method {
        AuthMethod::ApiKey => {
            let has_key = config
                .auth
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty());
            if !has_key {
                return Err(ConfigError::ValidationError(
                    "auth.api_key must be set when auth.method is api_key".to_string(),
                ));
            }
        }
        AuthMethod::None => {
            if !config.server.host.is_loopback() {
                return Err(ConfigError::ValidationError(format!(
                    "auth.method none requires a loopback server.host, got {}",
                    config.server.host
                )));
            }
        }
    }

    let url = config.catalog.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "catalog.url must be an http(s) URL, got '{}'",
            config.catalog.url
        )));
    }

    if config.relay.output_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "relay.output_url cannot be empty".to_string(),
        ));
    }

    if config.relay.probe_timeout_secs == 0 || config.relay.stop_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "relay.probe_timeout_secs and relay.stop_timeout_secs must be positive".to_string(),
        ));
    }

    let backoff = config.playback.retry_backoff_ms;
    if backoff == 0 || backoff > MAX_RETRY_BACKOFF_MS {
        return Err(ConfigError::ValidationError(format!(
            "playback.retry_backoff_ms must be between 1 and {}, got {}",
            MAX_RETRY_BACKOFF_MS, backoff
        )));
    }

    if config.playback.cooldown_secs > MAX_COOLDOWN_SECS {
        return Err(ConfigError::ValidationError(format!(
            "playback.cooldown_secs must be at most {}, got {}",
            MAX_COOLDOWN_SECS, config.playback.cooldown_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::UserId;
    use crate::catalog::CatalogConfig;
    use crate::config::{AuthConfig, DatabaseConfig, ServerConfig};
    use crate::playback::PlaybackConfig;
    use crate::relay::RelayConfig;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("adapter-key".to_string()),
            },
            catalog: CatalogConfig::new("https://api.example/clips"),
            relay: RelayConfig::new("rtmp://live.example/app/key"),
            playback: PlaybackConfig::new(UserId(1)),
        }
    }

    fn assert_invalid(config: &Config) {
        assert!(matches!(
            validate_config(config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_api_key_required() {
        let mut config = valid_config();
        config.auth.api_key = None;
        assert_invalid(&config);

        config.auth.api_key = Some(" ".to_string());
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_open_auth_only_on_loopback() {
        let mut config = valid_config();
        config.auth = AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        };
        assert_invalid(&config);

        config.server.host = "127.0.0.1".parse().unwrap();
        assert!(validate_config(&config).is_ok());

        config.server.host = "::1".parse().unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_catalog_url_scheme() {
        let mut config = valid_config();
        config.catalog.url = "ftp://api.example/clips".to_string();
        assert_invalid(&config);

        config.catalog.url = "http://localhost:9000/clips".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_output_fails() {
        let mut config = valid_config();
        config.relay.output_url = "  ".to_string();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_timeouts_fail() {
        let mut config = valid_config();
        config.relay.stop_timeout_secs = 0;
        assert_invalid(&config);

        let mut config = valid_config();
        config.playback.retry_backoff_ms = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_playback_bounds() {
        let mut config = valid_config();
        config.playback.retry_backoff_ms = MAX_RETRY_BACKOFF_MS;
        config.playback.cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(validate_config(&config).is_ok());

        config.playback.retry_backoff_ms = 10_000_000_000_000_000;
        assert_invalid(&config);

        let mut config = valid_config();
        config.playback.cooldown_secs = MAX_COOLDOWN_SECS + 1;
        assert_invalid(&config);

        config.playback.cooldown_secs = u64::MAX;
        assert_invalid(&config);
    }
}
