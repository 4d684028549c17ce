use async_trait::async_trait;

use super::{AuthError, AuthenticatedClient, Authenticator, Credentials};

/// Accepts callers presenting the one configured adapter key.
pub struct ApiKeyAuthenticator {
    key: Vec<u8>,
}

impl ApiKeyAuthenticator {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticatedClient, AuthError> {
        let presented = credentials
            .presented_key()
            .ok_or(AuthError::MissingCredentials)?;

        if keys_match(presented.as_bytes(), &self.key) {
            Ok(AuthenticatedClient {
                method: self.method_name(),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}
