//! Per-identity admission control.
//!
//! Every non-privileged identity may trigger an advance at most once per
//! cooldown window. The privileged identity is exempt and never touches the
//! cooldown records.

mod sqlite;
mod store;

pub use sqlite::SqliteCooldownStore;
pub use store::{Claim, CooldownError, CooldownStore};
pub(crate) use store::evaluate as evaluate_claim;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics;

/// Caller identity as assigned by the command front-end (a chat user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The privileged identity; no record was consulted.
    Exempt,
    /// Admitted; the cooldown record now holds the request time.
    Granted,
    /// Inside the cooldown window.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Exempt => "exempt",
            Self::Granted => "granted",
            Self::Denied { .. } => "denied",
        }
    }
}

/// Rate-limits advance requests per identity.
pub struct AdmissionGate {
    privileged: UserId,
    cooldown: Duration,
    store: Arc<dyn CooldownStore>,
}

impl AdmissionGate {
    pub fn new(privileged: UserId, cooldown: Duration, store: Arc<dyn CooldownStore>) -> Self {
        Self {
            privileged,
            cooldown,
            store,
        }
    }

    pub fn is_privileged(&self, user_id: UserId) -> bool {
        user_id == self.privileged
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check and, when admitted, record the request.
    ///
    /// A store failure is returned to the caller; the request must then be
    /// treated as not admitted.
    pub fn try_admit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Admission, CooldownError> {
        let admission = if self.is_privileged(user_id) {
            Admission::Exempt
        } else {
            match self.store.claim(user_id, now, self.cooldown)? {
                Claim::Granted => Admission::Granted,
                Claim::Denied { last_accepted } => Admission::Denied {
                    retry_after: self
                        .cooldown
                        .checked_sub(&now.signed_duration_since(last_accepted))
                        .unwrap_or(self.cooldown),
                },
            }
        };

        metrics::ADMISSION_DECISIONS
            .with_label_values(&[admission.label()])
            .inc();

        Ok(admission)
    }
}
