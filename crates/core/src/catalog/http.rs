//! HTTP catalog client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{Candidate, CatalogEntry};
use super::{CatalogError, CatalogSource};

/// Catalog endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// URL returning the JSON array of clips.
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl CatalogConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Fetches the candidate queue from a remote JSON endpoint.
pub struct HttpCatalog {
    client: Client,
    url: String,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<Candidate>, CatalogError> {
        debug!("Fetching catalog from {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        parse_catalog(&body)
    }
}

/// Parse a catalog body.
///
/// The body must be a JSON array. Entries missing a required field are
/// skipped; the rest keep their catalog order.
pub fn parse_catalog(body: &str) -> Result<Vec<Candidate>, CatalogError> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        CatalogError::ParseError(format!("Catalog response is not a JSON array: {}", e))
    })?;

    let total = raw.len();
    let candidates: Vec<Candidate> = raw
        .into_iter()
        .enumerate()
        .filter_map(
            |(idx, value)| match serde_json::from_value::<CatalogEntry>(value) {
                Ok(entry) => Some(entry.into()),
                Err(e) => {
                    warn!("Skipping malformed catalog entry #{}: {}", idx, e);
                    None
                }
            },
        )
        .collect();

    debug!("Parsed {} of {} catalog entries", candidates.len(), total);

    Ok(candidates)
}
