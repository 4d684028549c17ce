//! Authentication of the front-end adapter that relays chat commands.
//!
//! Chat user ids arrive in a plain header, so they are only trusted on a
//! request that first proves it comes from a configured adapter.

mod api_key;

pub use api_key::ApiKeyAuthenticator;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication misconfigured: {0}")]
    Misconfigured(String),
}

/// Credentials presented by a caller, lifted out of the transport.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Token from `Authorization: Bearer <token>`
    pub bearer: Option<String>,
    /// Value of `X-API-Key`
    pub api_key: Option<String>,
}

impl Credentials {
    /// Key to check, preferring the bearer token.
    pub fn presented_key(&self) -> Option<&str> {
        self.bearer.as_deref().or(self.api_key.as_deref())
    }
}

/// An adapter whose credentials were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedClient {
    pub method: &'static str,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials)
        -> Result<AuthenticatedClient, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Accepts every caller. Only allowed on a loopback listener.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(
        &self,
        _credentials: &Credentials,
    ) -> Result<AuthenticatedClient, AuthError> {
        Ok(AuthenticatedClient {
            method: self.method_name(),
        })
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

pub fn create_authenticator(config: &AuthConfig) -> Result<Arc<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Arc::new(NoneAuthenticator)),
        AuthMethod::ApiKey => {
            let key = config
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    AuthError::Misconfigured("auth.api_key is required for api_key".to_string())
                })?;
            Ok(Arc::new(ApiKeyAuthenticator::new(key)))
        }
    }
}
