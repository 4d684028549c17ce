//! Playback orchestration.
//!
//! Owns "what is currently playing" and drives the relay:
//! - Gated and privileged advances pre-empt the running clip
//! - Relay completions trigger an automatic advance
//! - Failed automatic advances are retried at a fixed interval until an
//!   explicit command takes over

mod config;
mod resolver;
mod runner;
mod types;

pub use config::{PlaybackConfig, MAX_COOLDOWN_SECS, MAX_RETRY_BACKOFF_MS};
pub use resolver::{CandidateResolver, ResolveError, ResolveOutcome};
pub use runner::{create_playback_system, PlaybackHandle, PlaybackOrchestrator};
pub use types::{NowPlaying, PlaybackError, PlaybackEvent, PlaybackStatus, StopOutcome, Trigger};
