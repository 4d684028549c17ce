//! Audit log query endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use clipcast_core::audit::{Page, DEFAULT_PAGE_SIZE};
use clipcast_core::{AuditFilter, AuditRecord, UserId};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::state::AppState;

/// Query parameters for `GET /audit`. Malformed ids or negative paging are
/// rejected by the extractor with 400.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    pub event_type: Option<String>,
    pub user_id: Option<UserId>,
    pub handle_id: Option<Uuid>,
    pub trigger: Option<String>,
    pub outcome: Option<String>,
    /// ISO 8601, inclusive
    pub from: Option<DateTime<Utc>>,
    /// ISO 8601, inclusive
    pub to: Option<DateTime<Utc>>,
    /// Default 100, capped at 1000
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<AuditQueryParams> for AuditFilter {
    fn from(params: AuditQueryParams) -> Self {
        Self {
            event_type: params.event_type,
            user: params.user_id,
            handle: params.handle_id,
            trigger: params.trigger,
            outcome: params.outcome,
            since: params.from,
            until: params.to,
            page: Page::new(
                params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
                params.offset.unwrap_or(0),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Matching events across all pages
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

/// Store failure, reported as 500.
pub struct AuditQueryError(String);

impl IntoResponse for AuditQueryError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Audit query failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, AuditQueryError> {
    let filter = AuditFilter::from(params);
    let store = state.audit_store();

    let events = store
        .query(&filter)
        .map_err(|e| AuditQueryError(format!("Failed to query audit events: {}", e)))?;
    let total = store
        .count(&filter)
        .map_err(|e| AuditQueryError(format!("Failed to count audit events: {}", e)))?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit: filter.page.limit,
        offset: filter.page.offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcast_core::audit::MAX_PAGE_SIZE;

    #[test]
    fn test_filter_defaults() {
        let filter = AuditFilter::from(AuditQueryParams::default());
        assert_eq!(filter.page, Page::default());
        assert!(filter.event_type.is_none());
        assert!(filter.user.is_none());
    }

    #[test]
    fn test_filter_carries_typed_fields() {
        let handle = Uuid::new_v4();
        let params = AuditQueryParams {
            limit: Some(50_000),
            offset: Some(20),
            user_id: Some(UserId(8)),
            handle_id: Some(handle),
            trigger: Some("auto".to_string()),
            ..Default::default()
        };
        let filter = AuditFilter::from(params);
        assert_eq!(filter.page, Page { limit: MAX_PAGE_SIZE, offset: 20 });
        assert_eq!(filter.user, Some(UserId(8)));
        assert_eq!(filter.handle, Some(handle));
        assert_eq!(filter.trigger.as_deref(), Some("auto"));
    }
}
