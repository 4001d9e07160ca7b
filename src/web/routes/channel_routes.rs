use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{non_blank, split_topics};
use crate::models::{ChannelConfig, ChannelUpdate, Package};
use crate::web::error::error_body;
use crate::web::{AppError, AppState};

// --- Request/Response Structs ---

#[derive(Deserialize)]
pub struct CreateChannelForm {
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_name: String,
    #[serde(default)]
    channel_description: String,
    content_style: Option<String>,
    target_audience: Option<String>,
    content_topics: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateChannelForm {
    #[serde(default)]
    channel_name: String,
    #[serde(default)]
    channel_description: String,
    content_style: Option<String>,
    target_audience: Option<String>,
    content_topics: Option<String>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListChannelsQuery {
    active_only: Option<bool>,
}

#[derive(Deserialize)]
pub struct BatchCreateForm {
    #[serde(default)]
    topics: Vec<String>,
    additional_context: Option<String>,
}

#[derive(Serialize)]
pub struct BatchCreateResponse {
    channel_id: String,
    total: usize,
    succeeded: usize,
    failed: usize,
    results: Vec<serde_json::Value>,
}

// --- Route Handlers ---

async fn create_channel_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Form(form), _): WithRejection<Form<CreateChannelForm>, AppError>,
) -> Result<(StatusCode, Json<ChannelConfig>), AppError> {
    let mut channel = ChannelConfig::new(
        form.channel_id.trim(),
        form.channel_name.trim(),
        form.channel_description.trim(),
    )
    .with_topics(split_topics(form.content_topics.as_deref()));
    channel.content_style = non_blank(form.content_style);
    channel.target_audience = non_blank(form.target_audience);

    let created = app_state.registry.create(channel)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_channels_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ListChannelsQuery>, AppError>,
) -> Json<Vec<ChannelConfig>> {
    if query.active_only.unwrap_or(false) {
        Json(app_state.registry.list_active())
    } else {
        Json(app_state.registry.list())
    }
}

async fn get_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelConfig>, AppError> {
    Ok(Json(app_state.registry.get(&channel_id)?))
}

async fn update_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<UpdateChannelForm>, AppError>,
) -> Result<Json<ChannelConfig>, AppError> {
    let is_active = match form.is_active {
        Some(flag) => flag,
        None => app_state.registry.get(&channel_id)?.is_active,
    };
    let update = ChannelUpdate {
        channel_name: form.channel_name.trim().to_string(),
        channel_description: form.channel_description.trim().to_string(),
        content_style: non_blank(form.content_style),
        target_audience: non_blank(form.target_audience),
        content_topics: split_topics(form.content_topics.as_deref()),
        is_active,
    };
    Ok(Json(app_state.registry.update(&channel_id, update)?))
}

async fn delete_channel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<StatusCode, AppError> {
    app_state.registry.delete(&channel_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Packages are keyed by channel id only, so this works for deleted channels.
async fn list_channel_packages_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Json<Vec<Package>> {
    Json(app_state.packages.list_by_channel(&channel_id))
}

async fn batch_create_handler(
    State(app_state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    WithRejection(axum_extra::extract::Form(form), _): WithRejection<
        axum_extra::extract::Form<BatchCreateForm>,
        AppError,
    >,
) -> Result<Json<BatchCreateResponse>, AppError> {
    let items = app_state
        .orchestrator
        .run_batch(
            &channel_id,
            form.topics,
            non_blank(form.additional_context),
            &app_state.shutdown,
        )
        .await?;

    let total = items.len();
    let mut succeeded = 0;
    let results = items
        .into_iter()
        .map(|item| match item.result {
            Ok(package) => {
                succeeded += 1;
                json!({ "topic": item.topic, "status": "ok", "package": package })
            }
            Err(err) => json!({ "topic": item.topic, "status": "failed", "error": error_body(&err) }),
        })
        .collect();

    info!(channel_id = %channel_id, total, succeeded, "Batch create finished.");
    Ok(Json(BatchCreateResponse {
        channel_id,
        total,
        succeeded,
        failed: total - succeeded,
        results,
    }))
}

pub fn create_channels_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_channels_handler).post(create_channel_handler))
        .route(
            "/{channel_id}",
            get(get_channel_handler)
                .put(update_channel_handler)
                .delete(delete_channel_handler),
        )
        .route("/{channel_id}/packages", get(list_channel_packages_handler))
        .route("/{channel_id}/batch-create", post(batch_create_handler))
}
