//! Playback command handlers.
//!
//! These are the commands the chat adapter exposes: status, the gated
//! "advance" button, the privileged `next` and `stop`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use clipcast_core::{NowPlaying, PlaybackError, PlaybackStatus, StopOutcome};

use super::middleware::CallerId;
use crate::state::AppState;

// ============================================================================
// Error Mapping
// ============================================================================

/// Error response body
#[derive(Debug, Serialize)]
pub struct PlaybackErrorResponse {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// A playback error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub PlaybackError);

impl From<PlaybackError> for ApiError {
    fn from(error: PlaybackError) -> Self {
        Self(error)
    }
}

fn status_for(error: &PlaybackError) -> StatusCode {
    match error {
        PlaybackError::AdmissionDenied { .. } => StatusCode::TOO_MANY_REQUESTS,
        PlaybackError::Unauthorized => StatusCode::FORBIDDEN,
        PlaybackError::EmptyCatalog | PlaybackError::Unavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PlaybackError::CatalogFetchFailed(_) => StatusCode::BAD_GATEWAY,
        PlaybackError::ProcessSpawnFailed(_) | PlaybackError::CooldownStore(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let retry_after_secs = match self.0 {
            PlaybackError::AdmissionDenied { retry_after_secs } => Some(retry_after_secs),
            _ => None,
        };
        let body = Json(PlaybackErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
            retry_after_secs,
        });

        match retry_after_secs {
            Some(secs) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Current playback status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.playback().status())
}

/// Gated advance, available to every identity
pub async fn advance(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<NowPlaying>, ApiError> {
    info!(user_id = %user_id, "Advance requested");
    let now_playing = state.playback().request_advance(user_id, Utc::now()).await?;
    Ok(Json(now_playing))
}

/// Skip to the next clip (privileged)
pub async fn next(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<NowPlaying>, ApiError> {
    info!(user_id = %user_id, "Next requested");
    let now_playing = state.playback().request_next(user_id, Utc::now()).await?;
    Ok(Json(now_playing))
}

/// Stop playback (privileged)
pub async fn stop(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<StopOutcome>, ApiError> {
    info!(user_id = %user_id, "Stop requested");
    let outcome = state.playback().request_stop(user_id).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                PlaybackError::AdmissionDenied {
                    retry_after_secs: 5,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (PlaybackError::Unauthorized, StatusCode::FORBIDDEN),
            (PlaybackError::EmptyCatalog, StatusCode::SERVICE_UNAVAILABLE),
            (
                PlaybackError::CatalogFetchFailed("timeout".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PlaybackError::ProcessSpawnFailed("enoent".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (PlaybackError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, expected) in cases {
            assert_eq!(status_for(&error), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_admission_denied_sets_retry_after() {
        let response = ApiError(PlaybackError::AdmissionDenied {
            retry_after_secs: 840,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "840");
    }
}
