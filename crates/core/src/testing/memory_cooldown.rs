//! In-memory cooldown store for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::admission::{evaluate_claim, Claim, CooldownError, CooldownStore, UserId};

/// Cooldown store backed by a `HashMap`.
///
/// Claims are atomic under a single lock, like the SQLite store. Failures can
/// be injected with [`fail_next`](Self::fail_next).
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    records: Mutex<HashMap<UserId, DateTime<Utc>>>,
    next_error: Mutex<Option<String>>,
    claims: AtomicUsize,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next store call fail with a database error.
    pub fn fail_next(&self, message: &str) {
        *self.next_error.lock().unwrap() = Some(message.to_string());
    }

    /// Number of `claim` calls made so far.
    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    /// Seed a record directly.
    pub fn set_last_accepted(&self, user_id: UserId, at: DateTime<Utc>) {
        self.records.lock().unwrap().insert(user_id, at);
    }

    fn take_error(&self) -> Result<(), CooldownError> {
        match self.next_error.lock().unwrap().take() {
            Some(message) => Err(CooldownError::Database(message)),
            None => Ok(()),
        }
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn last_accepted(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, CooldownError> {
        self.take_error()?;
        Ok(self.records.lock().unwrap().get(&user_id).copied())
    }

    fn claim(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, CooldownError> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        self.take_error()?;

        let mut records = self.records.lock().unwrap();
        let claim = evaluate_claim(records.get(&user_id).copied(), now, window);
        if claim == Claim::Granted {
            records.insert(user_id, now);
        }
        Ok(claim)
    }
}
