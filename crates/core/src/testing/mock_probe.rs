//! Mock duration probe for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::relay::{DurationProbe, RelayError};

/// Duration reported for locators that were not configured.
pub const DEFAULT_DURATION_SECS: f64 = 120.0;

/// Mock implementation of the DurationProbe trait.
///
/// Every locator is playable for [`DEFAULT_DURATION_SECS`] unless configured
/// otherwise. Probed locators are recorded in order.
#[derive(Debug, Default)]
pub struct MockProbe {
    /// `None` marks a locator as unplayable.
    durations: Arc<RwLock<HashMap<String, Option<f64>>>>,
    next_error: Arc<RwLock<Option<RelayError>>>,
    probed: Arc<RwLock<Vec<String>>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_duration(&self, locator: &str, duration_secs: f64) {
        self.durations
            .write()
            .await
            .insert(locator.to_string(), Some(duration_secs));
    }

    pub async fn set_unplayable(&self, locator: &str) {
        self.durations.write().await.insert(locator.to_string(), None);
    }

    /// Make the next probe fail as if the probe tool were broken.
    pub async fn set_next_error(&self, error: RelayError) {
        *self.next_error.write().await = Some(error);
    }

    /// Locators probed so far.
    pub async fn probed(&self) -> Vec<String> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl DurationProbe for MockProbe {
    async fn probe_duration(&self, locator: &str) -> Result<Option<f64>, RelayError> {
        self.probed.write().await.push(locator.to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .durations
            .read()
            .await
            .get(locator)
            .copied()
            .unwrap_or(Some(DEFAULT_DURATION_SECS)))
    }
}
