use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    audit, handlers,
    middleware::{auth_middleware, metrics_middleware},
    playback, ws,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything except health requires the adapter key
    let protected_routes = Router::new()
        // Config and metrics
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Playback commands
        .route("/playback", get(playback::get_status))
        .route("/playback/advance", post(playback::advance))
        .route("/playback/next", post(playback::next))
        .route("/playback/stop", post(playback::stop))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Live events
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.authenticator(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
