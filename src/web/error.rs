use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{FormRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::state::{PackageStoreError, RegistryError};
use crate::workflow::{ErrorKind, WorkflowError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Workflow(err) => err.kind,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::IndexOutOfRange => StatusCode::BAD_REQUEST,
        ErrorKind::ChannelNotFound | ErrorKind::PackageNotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateChannel | ErrorKind::DuplicateId => StatusCode::CONFLICT,
        ErrorKind::ProviderUnavailable | ErrorKind::ParseError | ErrorKind::IncompleteBatch => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// The JSON body shared by error responses and failed batch entries.
pub fn error_body(err: &WorkflowError) -> serde_json::Value {
    json!({
        "error": err.message,
        "kind": err.kind,
        "stage": err.step,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::InvalidInput(msg) => WorkflowError::new(ErrorKind::InvalidInput, msg),
            AppError::Workflow(err) => err,
        };
        (status_for(err.kind), Json(error_body(&err))).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Workflow(err.into())
    }
}

impl From<PackageStoreError> for AppError {
    fn from(err: PackageStoreError) -> Self {
        AppError::Workflow(err.into())
    }
}

// Extractor rejections answer with the same JSON body as every other error.

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<axum_extra::extract::FormRejection> for AppError {
    fn from(rejection: axum_extra::extract::FormRejection) -> Self {
        AppError::InvalidInput(rejection.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}
