use axum::{
    extract::{Path, State},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use std::num::IntErrorKind;
use std::sync::Arc;

use crate::models::{Package, CANDIDATE_COUNT};
use crate::web::{AppError, AppState};
use crate::workflow::{ErrorKind, WorkflowError};

#[derive(Deserialize)]
pub struct SelectImageForm {
    #[serde(default)]
    index: String,
}

/// Numbers too large for `i64` are still indices, just out of range.
fn parse_index(raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidInput("index is required".to_string()));
    }
    raw.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            AppError::Workflow(WorkflowError::new(
                ErrorKind::IndexOutOfRange,
                format!("Image index {raw} is out of range (0..{CANDIDATE_COUNT})"),
            ))
        }
        _ => AppError::InvalidInput(format!("index must be an integer, got {raw:?}")),
    })
}

async fn list_packages_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<Package>> {
    Json(app_state.packages.list_all())
}

async fn get_package_handler(
    State(app_state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(app_state.packages.get(&package_id)?))
}

async fn select_image_handler(
    State(app_state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<SelectImageForm>, AppError>,
) -> Result<Json<Package>, AppError> {
    let index = parse_index(&form.index)?;
    Ok(Json(app_state.packages.select_image(&package_id, index)?))
}

pub fn create_packages_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_packages_handler))
        .route("/{package_id}", get(get_package_handler))
        .route("/{package_id}/select-image", post(select_image_handler))
}
