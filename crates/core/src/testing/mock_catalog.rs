//! Mock catalog source for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog::{Candidate, CatalogError, CatalogSource};

/// Mock implementation of the CatalogSource trait.
///
/// Returns a configurable listing on every fetch. Failures can be injected
/// once with `set_next_error` or made persistent with `set_unavailable`.
#[derive(Debug, Default)]
pub struct MockCatalog {
    candidates: Arc<RwLock<Vec<Candidate>>>,
    next_error: Arc<RwLock<Option<CatalogError>>>,
    unavailable: Arc<RwLock<bool>>,
    fetches: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog that already lists `candidates`.
    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Arc::new(RwLock::new(candidates)),
            ..Self::default()
        }
    }

    /// Replace the listing returned by subsequent fetches.
    pub async fn set_candidates(&self, candidates: Vec<Candidate>) {
        *self.candidates.write().await = candidates;
    }

    /// Make the next fetch fail.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every fetch fail with a 503 until cleared.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Number of fetches made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self) -> Result<Vec<Candidate>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if *self.unavailable.read().await {
            return Err(CatalogError::ApiError {
                status: 503,
                message: "catalog unavailable".to_string(),
            });
        }

        Ok(self.candidates.read().await.clone())
    }
}
