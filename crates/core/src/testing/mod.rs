//! Testing utilities and mock implementations.
//!
//! Every external seam of the playback pipeline has an in-process stand-in
//! here, so the orchestrator can be driven end to end without ffmpeg, a
//! catalog service, or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipcast_core::testing::{fixtures, MockCatalog, MockProbe, MockRelayLauncher};
//!
//! let catalog = MockCatalog::new();
//! catalog.set_candidates(vec![fixtures::candidate("Intro")]).await;
//!
//! let launcher = MockRelayLauncher::new();
//! // ... start playback, then end the relay by hand:
//! launcher.finish_latest(RelayExit::Completed);
//! ```

mod memory_cooldown;
mod mock_catalog;
mod mock_probe;
mod mock_relay;

pub use memory_cooldown::MemoryCooldownStore;
pub use mock_catalog::MockCatalog;
pub use mock_probe::MockProbe;
pub use mock_relay::{LifecycleEvent, MockRelayLauncher};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::Candidate;

    fn slug(title: &str) -> String {
        title.to_lowercase().replace(' ', "-")
    }

    /// Create an unprobed candidate with reasonable defaults.
    pub fn candidate(title: &str) -> Candidate {
        let slug = slug(title);
        Candidate::new(format!("https://cdn.test/{}/index.m3u8", slug), title)
            .with_image_url(format!("https://img.test/{}.jpg", slug))
            .with_code(format!("{}-001", slug.to_uppercase()))
    }

    /// Create a candidate that has already been probed.
    pub fn probed_candidate(title: &str, duration_secs: f64) -> Candidate {
        candidate(title).with_duration(duration_secs)
    }

    /// Create an unprobed catalog listing, in order.
    pub fn catalog(titles: &[&str]) -> Vec<Candidate> {
        titles.iter().map(|t| candidate(t)).collect()
    }
}
