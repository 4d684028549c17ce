//! Types for the relay module.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RelayError;
use crate::catalog::Candidate;

/// A single relay run, bound to one probed candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayJob {
    pub handle_id: Uuid,
    pub locator: String,
    /// Explicit cutoff passed to the relay, in seconds.
    pub duration_secs: f64,
}

impl RelayJob {
    pub fn for_candidate(handle_id: Uuid, candidate: &Candidate) -> Result<Self, RelayError> {
        let duration_secs = candidate.duration_secs.ok_or_else(|| RelayError::Unprobed {
            locator: candidate.locator.clone(),
        })?;

        Ok(Self {
            handle_id,
            locator: candidate.locator.clone(),
            duration_secs,
        })
    }
}

/// How a relay process ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelayExit {
    /// Exited with a success status.
    Completed,
    /// Exited with a failure status or was killed by a signal.
    Crashed { code: Option<i32> },
}

impl RelayExit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Crashed { .. } => "crashed",
        }
    }
}

/// Lifecycle of one relay handle.
///
/// `Starting -> Running -> {Completed, Terminated, Crashed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HandleState {
    Starting,
    Running,
    Completed,
    /// Stopped on request.
    Terminated,
    Crashed { code: Option<i32> },
}

impl From<RelayExit> for HandleState {
    fn from(exit: RelayExit) -> Self {
        match exit {
            RelayExit::Completed => Self::Completed,
            RelayExit::Crashed { code } => Self::Crashed { code },
        }
    }
}

/// Posted when a relay process exits without being asked to.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayCompletion {
    pub handle_id: Uuid,
    pub exit: RelayExit,
}

/// Receiver of completion signals. Called from the watcher task.
pub type CompletionSink = Arc<dyn Fn(RelayCompletion) + Send + Sync>;
