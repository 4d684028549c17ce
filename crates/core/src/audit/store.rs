use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::AuditRecord;
use crate::admission::UserId;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A window into the newest-first audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, 0)
    }
}

/// Selects audit records; every field that is set must match.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<String>,
    /// Identity that caused the event (requester, or who stopped playback)
    pub user: Option<UserId>,
    pub handle: Option<Uuid>,
    /// `advance`, `next` or `auto`; matches playback starts and failed resolutions
    pub trigger: Option<String>,
    /// `completed` or `crashed`; matches relay exits
    pub outcome: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page: Page,
}

/// Trait for audit event storage
pub trait AuditStore: Send + Sync {
    /// Insert an audit record, returns the assigned ID
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Matching records, newest first, limited to the filter's page
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Matching records across all pages
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}
