use axum::{
    extract::{Query, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::server::config::ServerConfig;
use crate::state::{ChannelRegistry, CleanupPolicy, PackageStore};
use crate::version::VERSION;
use crate::workflow::{CancelToken, WorkflowOrchestrator};

pub mod error;
pub mod routes;

pub use error::AppError;

use routes::*;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChannelRegistry>,
    pub packages: Arc<PackageStore>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub config: Arc<ServerConfig>,
    /// Fired on server shutdown; in-flight workflows observe it.
    pub shutdown: CancelToken,
}

async fn health_check_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}

#[derive(Deserialize)]
pub struct CleanupQuery {
    max_age_hours: Option<i64>,
    max_count: Option<usize>,
}

async fn cleanup_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<CleanupQuery>, AppError>,
) -> Result<Json<serde_json::Value>, AppError> {
    let max_age_hours = query
        .max_age_hours
        .unwrap_or(app_state.config.package_max_age_hours);
    if max_age_hours < 0 {
        return Err(AppError::InvalidInput(
            "max_age_hours must not be negative".to_string(),
        ));
    }

    let policy = CleanupPolicy {
        max_age: Some(chrono::Duration::hours(max_age_hours)),
        max_count: query.max_count,
    };
    let evicted = app_state.packages.cleanup(policy);
    let remaining = app_state.packages.len();
    info!(evicted, remaining, "Manual package cleanup.");

    Ok(Json(json!({ "evicted": evicted, "remaining": remaining })))
}

async fn statistics_handler(State(app_state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let channels = app_state.packages.channel_statistics();
    Json(json!({
        "total_channels": app_state.registry.len(),
        "total_packages": app_state.packages.len(),
        "channels": channels,
    }))
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/cleanup", post(cleanup_handler))
        .route("/api/statistics", get(statistics_handler))
        .merge(content_routes::create_content_router())
        .nest("/api/channels", channel_routes::create_channels_router())
        .nest("/api/packages", package_routes::create_packages_router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
