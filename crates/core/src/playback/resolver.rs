//! Selection of the next playable candidate.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{Candidate, CatalogError, CatalogSource};
use crate::metrics;
use crate::relay::{DurationProbe, RelayError};

/// Why a resolution attempt failed outright.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error("probe failed: {0}")]
    Probe(#[from] RelayError),
}

/// Result of one resolution attempt.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// The first playable candidate, with its duration filled in.
    Found(Candidate),
    /// The catalog was empty or no candidate was playable.
    EmptyCatalog,
    Failed(ResolveError),
}

impl ResolveOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::EmptyCatalog => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

/// Fetches the catalog and returns the first candidate that probes as playable.
pub struct CandidateResolver {
    catalog: Arc<dyn CatalogSource>,
    probe: Arc<dyn DurationProbe>,
}

impl CandidateResolver {
    pub fn new(catalog: Arc<dyn CatalogSource>, probe: Arc<dyn DurationProbe>) -> Self {
        Self { catalog, probe }
    }

    /// Run one resolution attempt.
    ///
    /// Candidates are probed strictly in catalog order and probing stops at
    /// the first playable one. Nothing is retried within an attempt.
    pub async fn resolve_next(&self) -> ResolveOutcome {
        let outcome = self.resolve().await;
        metrics::RESOLUTIONS
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }

    async fn resolve(&self) -> ResolveOutcome {
        let candidates = match self.catalog.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Catalog fetch from {} failed: {}", self.catalog.name(), e);
                return ResolveOutcome::Failed(e.into());
            }
        };

        debug!("Catalog returned {} candidates", candidates.len());

        for (idx, candidate) in candidates.into_iter().enumerate() {
            let started = Instant::now();
            let probed = self.probe.probe_duration(&candidate.locator).await;
            metrics::PROBE_DURATION
                .with_label_values(&[])
                .observe(started.elapsed().as_secs_f64());

            match probed {
                Ok(Some(duration)) => {
                    info!(
                        "Selected candidate #{} '{}' ({:.1}s)",
                        idx, candidate.title, duration
                    );
                    return ResolveOutcome::Found(candidate.with_duration(duration));
                }
                Ok(None) => {
                    metrics::CANDIDATES_SKIPPED.inc();
                    warn!(
                        "Skipping unplayable candidate #{} '{}' ({})",
                        idx, candidate.title, candidate.locator
                    );
                }
                Err(e) => {
                    warn!("Duration probe failed: {}", e);
                    return ResolveOutcome::Failed(e.into());
                }
            }
        }

        ResolveOutcome::EmptyCatalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockCatalog, MockProbe};

    fn resolver(catalog: &Arc<MockCatalog>, probe: &Arc<MockProbe>) -> CandidateResolver {
        CandidateResolver::new(
            Arc::clone(catalog) as Arc<dyn CatalogSource>,
            Arc::clone(probe) as Arc<dyn DurationProbe>,
        )
    }

    #[tokio::test]
    async fn test_skips_unplayable_and_stops_at_first_playable() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());
        let a = fixtures::candidate("A");
        let b = fixtures::candidate("B");
        let c = fixtures::candidate("C");
        catalog
            .set_candidates(vec![a.clone(), b.clone(), c.clone()])
            .await;
        probe.set_unplayable(&a.locator).await;
        probe.set_duration(&b.locator, 321.0).await;

        match resolver(&catalog, &probe).resolve_next().await {
            ResolveOutcome::Found(found) => {
                assert_eq!(found.title, "B");
                assert_eq!(found.duration_secs, Some(321.0));
            }
            other => panic!("expected B, got {:?}", other),
        }

        assert_eq!(probe.probed().await, vec![a.locator, b.locator]);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());

        let outcome = resolver(&catalog, &probe).resolve_next().await;
        assert!(matches!(outcome, ResolveOutcome::EmptyCatalog));
        assert!(probe.probed().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_unplayable_is_empty() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());
        let a = fixtures::candidate("A");
        let b = fixtures::candidate("B");
        catalog.set_candidates(vec![a.clone(), b.clone()]).await;
        probe.set_unplayable(&a.locator).await;
        probe.set_unplayable(&b.locator).await;

        let outcome = resolver(&catalog, &probe).resolve_next().await;
        assert!(matches!(outcome, ResolveOutcome::EmptyCatalog));
        assert_eq!(probe.probed().await.len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_failure() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());
        catalog
            .set_next_error(CatalogError::ApiError {
                status: 500,
                message: "down".to_string(),
            })
            .await;

        let outcome = resolver(&catalog, &probe).resolve_next().await;
        assert!(matches!(
            outcome,
            ResolveOutcome::Failed(ResolveError::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_tool_failure() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());
        catalog.set_candidates(vec![fixtures::candidate("A")]).await;
        probe
            .set_next_error(RelayError::FfprobeNotFound {
                path: "ffprobe".into(),
            })
            .await;

        let outcome = resolver(&catalog, &probe).resolve_next().await;
        assert!(matches!(outcome, ResolveOutcome::Failed(ResolveError::Probe(_))));
    }

    #[tokio::test]
    async fn test_refetches_every_attempt() {
        let catalog = Arc::new(MockCatalog::new());
        let probe = Arc::new(MockProbe::new());
        catalog.set_candidates(vec![fixtures::candidate("A")]).await;
        let resolver = resolver(&catalog, &probe);

        resolver.resolve_next().await;
        resolver.resolve_next().await;
        assert_eq!(catalog.fetch_count(), 2);
    }
}
