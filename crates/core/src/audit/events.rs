use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admission::UserId;

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Command events
    AdmissionDenied {
        user_id: UserId,
        retry_after_secs: u64,
    },
    /// A privileged command from a non-privileged identity.
    CommandRejected {
        user_id: UserId,
        command: String,
        reason: String,
    },

    // Playback lifecycle
    PlaybackStarted {
        handle_id: Uuid,
        title: String,
        locator: String,
        code: String,
        duration_secs: f64,
        /// "advance", "next" or "auto"
        trigger: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
    },
    PlaybackStopped {
        handle_id: Uuid,
        title: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stopped_by: Option<UserId>,
    },
    RelayExited {
        handle_id: Uuid,
        title: String,
        /// "completed" or "crashed"
        outcome: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    ResolutionFailed {
        trigger: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        error: String,
        /// Set when an automatic retry was scheduled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_in_ms: Option<u64>,
    },
    RetryCancelled {
        attempts: u32,
    },
}

impl AuditEvent {
    /// Get the event type as a string (matches serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::AdmissionDenied { .. } => "admission_denied",
            Self::CommandRejected { .. } => "command_rejected",
            Self::PlaybackStarted { .. } => "playback_started",
            Self::PlaybackStopped { .. } => "playback_stopped",
            Self::RelayExited { .. } => "relay_exited",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::RetryCancelled { .. } => "retry_cancelled",
        }
    }

    /// Relay handle this event refers to, if any
    pub fn handle_id(&self) -> Option<Uuid> {
        match self {
            Self::PlaybackStarted { handle_id, .. }
            | Self::PlaybackStopped { handle_id, .. }
            | Self::RelayExited { handle_id, .. } => Some(*handle_id),
            _ => None,
        }
    }

    /// Identity that caused this event, if any
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::AdmissionDenied { user_id, .. } | Self::CommandRejected { user_id, .. } => {
                Some(*user_id)
            }
            Self::PlaybackStarted { user_id, .. } | Self::ResolutionFailed { user_id, .. } => {
                *user_id
            }
            Self::PlaybackStopped { stopped_by, .. } => *stopped_by,
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub handle_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
