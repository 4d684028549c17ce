//! Remote clip catalog.
//!
//! The catalog is re-fetched on every resolution attempt and never cached.

mod http;
mod types;

pub use http::{parse_catalog, CatalogConfig, HttpCatalog};
pub use types::Candidate;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Endpoint returned a non-success status.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Source of the ordered candidate queue.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns the name of this source implementation.
    fn name(&self) -> &str;

    /// Fetch the current candidate queue, in catalog order.
    async fn fetch(&self) -> Result<Vec<Candidate>, CatalogError>;
}
