//! Adapter authentication, caller identity extraction and metrics
//! middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, MatchedPath, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use clipcast_core::{AuthError, AuthenticatedClient, Authenticator, Credentials, UserId};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use crate::metrics::{
    HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION, IDENTITY_FAILURES_TOTAL,
};

/// Header carrying the chat user id of the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Alternative to `Authorization: Bearer` for the adapter key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// Paths are labelled by matched route so label cardinality stays bounded.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    Credentials {
        bearer: text(header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(|token| token.trim().to_string()),
        api_key: text(API_KEY_HEADER).map(|key| key.trim().to_string()),
    }
}

/// Authenticates the front-end adapter before any handler runs.
///
/// On success the accepted [`AuthenticatedClient`] is stored in the request
/// extensions, which is what lets [`CallerId`] trust `X-User-Id`.
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = credentials_from_headers(request.headers());

    match authenticator.authenticate(&credentials).await {
        Ok(client) => {
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        Err(AuthError::MissingCredentials) => {
            IdentityRejection::Unauthenticated("missing_credentials").into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            warn!(path = %request.uri().path(), "Rejected request with invalid credentials");
            IdentityRejection::Unauthenticated("invalid_credentials").into_response()
        }
        Err(e) => {
            error!(error = %e, "Authenticator failed");
            IDENTITY_FAILURES_TOTAL
                .with_label_values(&["auth_error"])
                .inc();
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Extractor for the calling identity.
///
/// The front-end adapter forwards the chat user id in `X-User-Id`. The header
/// is only read once [`auth_middleware`] has accepted the adapter; otherwise
/// the request is rejected with 401. A missing or unparseable id is a 400.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub UserId);

/// Why a caller identity could not be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRejection {
    /// Adapter credentials missing or wrong; carries the metric reason
    Unauthenticated(&'static str),
    Missing,
    Invalid,
}

#[derive(Debug, Serialize)]
struct IdentityErrorResponse {
    error: String,
    kind: &'static str,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let (status, reason, message) = match self {
            Self::Unauthenticated(reason) => (
                StatusCode::UNAUTHORIZED,
                reason,
                "a valid adapter API key is required",
            ),
            Self::Missing => (
                StatusCode::BAD_REQUEST,
                "missing_identity",
                "missing X-User-Id header",
            ),
            Self::Invalid => (
                StatusCode::BAD_REQUEST,
                "invalid_identity",
                "X-User-Id must be an integer user id",
            ),
        };
        IDENTITY_FAILURES_TOTAL.with_label_values(&[reason]).inc();

        let body = Json(IdentityErrorResponse {
            error: message.to_string(),
            kind: reason,
        });
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        if parts.extensions.get::<AuthenticatedClient>().is_none() {
            return std::future::ready(Err(IdentityRejection::Unauthenticated(
                "unauthenticated",
            )));
        }

        let result = match parts.headers.get(USER_ID_HEADER) {
            None => Err(IdentityRejection::Missing),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.parse::<UserId>().ok())
                .map(CallerId)
                .ok_or(IdentityRejection::Invalid),
        };
        std::future::ready(result)
    }
}
