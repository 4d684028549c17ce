//! Trait definitions for the relay module.

use std::time::Duration;

use async_trait::async_trait;

use super::error::RelayError;
use super::types::{RelayExit, RelayJob};

/// Determines the playable duration of a stream.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Probe a stream locator.
    ///
    /// `Ok(None)` means the stream is unplayable (no valid positive duration,
    /// unreachable, or the probe timed out). `Err` is reserved for failures of
    /// the probe tool itself.
    async fn probe_duration(&self, locator: &str) -> Result<Option<f64>, RelayError>;
}

/// Spawns relay processes.
#[async_trait]
pub trait RelayLauncher: Send + Sync {
    /// Returns the name of this launcher implementation.
    fn name(&self) -> &str;

    /// Spawn the relay for a job. The returned process is already running.
    async fn launch(&self, job: &RelayJob) -> Result<Box<dyn RelayProcess>, RelayError>;
}

/// A running relay process.
#[async_trait]
pub trait RelayProcess: Send {
    /// OS process id, if there is one.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit on its own.
    ///
    /// Must be cancel-safe: dropping the future before it resolves leaves the
    /// process untouched so that `terminate` can still be called.
    async fn wait(&mut self) -> Result<RelayExit, RelayError>;

    /// Ask the process to exit, force-killing it if it is still alive after
    /// `grace`. Returns once the process has exited.
    async fn terminate(&mut self, grace: Duration) -> Result<(), RelayError>;
}
