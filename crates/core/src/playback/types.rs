//! Types for the playback orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::admission::UserId;
use crate::catalog::Candidate;
use crate::relay::RelayExit;

/// Errors reported to command callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    /// The caller is inside its cooldown window.
    #[error("advance denied, retry in {retry_after_secs}s")]
    AdmissionDenied { retry_after_secs: u64 },

    /// The command is reserved for the privileged identity.
    #[error("not authorized")]
    Unauthorized,

    /// The catalog could not be fetched or the probe tool failed.
    #[error("catalog fetch failed: {0}")]
    CatalogFetchFailed(String),

    /// No playable candidate in the catalog.
    #[error("no playable candidates")]
    EmptyCatalog,

    /// The relay process could not be started.
    #[error("failed to start relay: {0}")]
    ProcessSpawnFailed(String),

    /// The cooldown store failed; the request was not admitted.
    #[error("cooldown store error: {0}")]
    CooldownStore(String),

    /// The orchestrator task is no longer running.
    #[error("playback orchestrator unavailable")]
    Unavailable,
}

impl PlaybackError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AdmissionDenied { .. } => "admission_denied",
            Self::Unauthorized => "unauthorized",
            Self::CatalogFetchFailed(_) => "catalog_fetch_failed",
            Self::EmptyCatalog => "empty_catalog",
            Self::ProcessSpawnFailed(_) => "process_spawn_failed",
            Self::CooldownStore(_) => "cooldown_store",
            Self::Unavailable => "unavailable",
        }
    }
}

/// What caused a relay to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Gated advance from any identity.
    Advance { user_id: UserId },
    /// Privileged skip.
    Next { user_id: UserId },
    /// The previous relay ended, a retry fired, or autostart.
    Auto,
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Next { .. } => "next",
            Self::Auto => "auto",
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Advance { user_id } | Self::Next { user_id } => Some(*user_id),
            Self::Auto => None,
        }
    }
}

/// The clip currently being relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub handle_id: Uuid,
    pub candidate: Candidate,
    pub started_at: DateTime<Utc>,
    pub trigger: Trigger,
}

impl NowPlaying {
    pub fn duration_secs(&self) -> f64 {
        self.candidate.duration_secs.unwrap_or_default()
    }
}

/// Session status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackStatus {
    Idle {
        /// When the next automatic attempt is due, if one is pending.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_retry_at: Option<DateTime<Utc>>,
    },
    Playing { now_playing: NowPlaying },
}

impl PlaybackStatus {
    pub fn idle() -> Self {
        Self::Idle {
            next_retry_at: None,
        }
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        match self {
            Self::Playing { now_playing } => Some(now_playing),
            Self::Idle { .. } => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

/// Result of an explicit stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { candidate: Candidate },
    /// Nothing was playing, but a pending automatic retry was abandoned.
    RetryCancelled,
    NothingPlaying,
}

/// Broadcast to subscribers (chat adapter, WebSocket clients).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Started {
        now_playing: NowPlaying,
    },
    Stopped {
        handle_id: Uuid,
        title: String,
        stopped_by: UserId,
    },
    Preempted {
        handle_id: Uuid,
        title: String,
        trigger: Trigger,
    },
    RelayExited {
        handle_id: Uuid,
        title: String,
        exit: RelayExit,
    },
    RetryScheduled {
        reason: String,
        attempt: u32,
        retry_at: DateTime<Utc>,
    },
    RetryCancelled,
}
