//! External relay process management.
//!
//! This module provides:
//! - Duration probing of candidate streams (ffprobe)
//! - Spawning the relay that pushes one clip to the output sink (ffmpeg)
//! - A supervisor that owns the single running relay and reports when it
//!   exits on its own

mod config;
mod error;
mod ffmpeg;
mod supervisor;
mod traits;
mod types;

pub use config::RelayConfig;
pub use error::RelayError;
pub use ffmpeg::{parse_duration, ChildProcess, FfmpegRelay};
pub use supervisor::{RelayHandle, RelaySupervisor};
pub use traits::{DurationProbe, RelayLauncher, RelayProcess};
pub use types::{CompletionSink, HandleState, RelayCompletion, RelayExit, RelayJob};
