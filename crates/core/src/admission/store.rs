use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::UserId;

#[derive(Debug, Error)]
pub enum CooldownError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Result of an atomic check-and-set on a cooldown record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// No record, or the window had elapsed. The record now holds `now`.
    Granted,
    /// Still inside the window. The record was left untouched.
    Denied { last_accepted: DateTime<Utc> },
}

/// Durable per-identity storage of the last accepted request.
///
/// Records are created or overwritten on every granted claim and never deleted.
pub trait CooldownStore: Send + Sync {
    /// Last accepted request for an identity, if any.
    fn last_accepted(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, CooldownError>;

    /// Check the record against `window` and, if it has elapsed (or there is
    /// no record), write `now`. Both steps happen atomically for the identity,
    /// and the write is committed before `Claim::Granted` is returned.
    fn claim(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, CooldownError>;
}

/// Decide a claim against an existing record.
pub(crate) fn evaluate(
    last_accepted: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> Claim {
    match last_accepted {
        Some(last) if now.signed_duration_since(last) < window => Claim::Denied {
            last_accepted: last,
        },
        _ => Claim::Granted,
    }
}
