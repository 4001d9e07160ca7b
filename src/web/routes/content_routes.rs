use axum::{
    extract::{multipart::Field, DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::non_blank;
use crate::models::{InputData, Package, ReferenceFrame, MAX_REFERENCE_FRAME_BYTES};
use crate::web::{AppError, AppState};

#[derive(Deserialize, Default)]
pub struct CreateContentForm {
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    video_topic: String,
    additional_context: Option<String>,
}

impl CreateContentForm {
    fn into_input(self, frame: Option<ReferenceFrame>) -> Result<InputData, AppError> {
        let channel_id = self.channel_id.trim();
        if channel_id.is_empty() {
            return Err(AppError::InvalidInput("channel_id is required".to_string()));
        }
        let mut input = InputData::new(channel_id, self.video_topic.trim());
        input.additional_context = non_blank(self.additional_context);
        input.reference_frame = frame;
        Ok(input)
    }
}

/// A content request sent either as a urlencoded form or as multipart with
/// an optional `video_frame` image.
pub struct ContentRequest(pub InputData);

impl<S> FromRequest<S> for ContentRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        let input = if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            read_multipart(multipart).await?
        } else {
            let Form(form) = Form::<CreateContentForm>::from_request(req, state).await?;
            form.into_input(None)?
        };
        Ok(ContentRequest(input))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<InputData, AppError> {
    let mut form = CreateContentForm::default();
    let mut frame = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "channel_id" => form.channel_id = field.text().await?,
            "video_topic" => form.video_topic = field.text().await?,
            "additional_context" => form.additional_context = Some(field.text().await?),
            "video_frame" => frame = read_frame(field).await?,
            other => debug!(field = other, "Ignoring unknown multipart field."),
        }
    }

    form.into_input(frame)
}

/// An empty file part means no frame was chosen.
async fn read_frame(field: Field<'_>) -> Result<Option<ReferenceFrame>, AppError> {
    let mime_type = field.content_type().unwrap_or("image/jpeg").to_string();
    let data = field.bytes().await?;
    if data.is_empty() {
        return Ok(None);
    }
    if !mime_type.starts_with("image/") {
        return Err(AppError::InvalidInput(format!(
            "video_frame must be an image, got {mime_type}"
        )));
    }
    if data.len() > MAX_REFERENCE_FRAME_BYTES {
        return Err(AppError::InvalidInput(format!(
            "video_frame is larger than {MAX_REFERENCE_FRAME_BYTES} bytes"
        )));
    }
    Ok(Some(ReferenceFrame::new(mime_type, data.to_vec())))
}

async fn create_content_handler(
    State(app_state): State<Arc<AppState>>,
    ContentRequest(input): ContentRequest,
) -> Result<(StatusCode, Json<Package>), AppError> {
    let package = app_state.orchestrator.run(input, &app_state.shutdown).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

pub fn create_content_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/create-content", post(create_content_handler))
        .layer(DefaultBodyLimit::max(MAX_REFERENCE_FRAME_BYTES + 64 * 1024))
}
