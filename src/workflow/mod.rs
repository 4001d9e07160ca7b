use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::generation::{ContentError, ImageError, PromptError};
use crate::state::{PackageStoreError, RegistryError};

pub mod cancel;
pub mod orchestrator;

pub use cancel::CancelToken;
pub use orchestrator::{BatchItem, PackageIdGenerator, WorkflowOrchestrator};

/// The pipeline stage a workflow failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ResolveChannel,
    BuildPrompt,
    GenerateContent,
    GenerateImages,
    StorePackage,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ResolveChannel => "resolve_channel",
            Step::BuildPrompt => "build_prompt",
            Step::GenerateContent => "generate_content",
            Step::GenerateImages => "generate_images",
            Step::StorePackage => "store_package",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ChannelNotFound,
    PackageNotFound,
    DuplicateChannel,
    DuplicateId,
    IndexOutOfRange,
    ProviderUnavailable,
    ParseError,
    IncompleteBatch,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ChannelNotFound => "channel_not_found",
            ErrorKind::PackageNotFound => "package_not_found",
            ErrorKind::DuplicateChannel => "duplicate_channel",
            ErrorKind::DuplicateId => "duplicate_id",
            ErrorKind::IndexOutOfRange => "index_out_of_range",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::IncompleteBatch => "incomplete_batch",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a workflow run is. A run only ever moves forward, ending in
/// `PackageStored` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    ChannelResolved,
    PromptBuilt,
    ContentGenerated,
    ImagesGenerated,
    PackageStored,
    Failed { step: Step, kind: ErrorKind },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::PackageStored | WorkflowState::Failed { .. })
    }
}

/// A failure tagged with its kind and, when it happened inside a run, the
/// step that failed. The component's message is kept as-is.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct WorkflowError {
    pub step: Option<Step>,
    pub kind: ErrorKind,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            step: None,
            kind,
            message: message.into(),
        }
    }

    pub fn at(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn cancelled(step: Step) -> Self {
        Self::new(ErrorKind::Cancelled, format!("Workflow cancelled before {step} finished")).at(step)
    }
}

impl From<RegistryError> for WorkflowError {
    fn from(err: RegistryError) -> Self {
        let kind = match err {
            RegistryError::ChannelNotFound(_) => ErrorKind::ChannelNotFound,
            RegistryError::DuplicateChannel(_) => ErrorKind::DuplicateChannel,
            RegistryError::InvalidInput(_) => ErrorKind::InvalidInput,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<PackageStoreError> for WorkflowError {
    fn from(err: PackageStoreError) -> Self {
        let kind = match err {
            PackageStoreError::PackageNotFound(_) => ErrorKind::PackageNotFound,
            PackageStoreError::DuplicateId(_) => ErrorKind::DuplicateId,
            PackageStoreError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<PromptError> for WorkflowError {
    fn from(err: PromptError) -> Self {
        // A template that fails to render is caused by its inputs.
        Self::new(ErrorKind::InvalidInput, err.to_string())
    }
}

impl From<ContentError> for WorkflowError {
    fn from(err: ContentError) -> Self {
        let kind = match err {
            ContentError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            ContentError::ParseError(_) => ErrorKind::ParseError,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ImageError> for WorkflowError {
    fn from(err: ImageError) -> Self {
        let kind = match err {
            ImageError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            ImageError::IncompleteBatch { .. } => ErrorKind::IncompleteBatch,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_errors_map_to_kinds() {
        let err: WorkflowError = RegistryError::ChannelNotFound("x".into()).into();
        assert_eq!(err.kind, ErrorKind::ChannelNotFound);
        assert_eq!(err.message, "Channel not found: x");
        assert!(err.step.is_none());

        let err: WorkflowError = PackageStoreError::IndexOutOfRange { index: 9, len: 4 }.into();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange);

        let err = WorkflowError::from(ImageError::IncompleteBatch { expected: 4, got: 2 })
            .at(Step::GenerateImages);
        assert_eq!(err.kind, ErrorKind::IncompleteBatch);
        assert_eq!(err.step, Some(Step::GenerateImages));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorKind::ProviderUnavailable).unwrap(),
            serde_json::json!("provider_unavailable")
        );
        assert_eq!(
            serde_json::to_value(Step::GenerateContent).unwrap(),
            serde_json::json!(Step::GenerateContent.as_str())
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowState::PackageStored.is_terminal());
        assert!(WorkflowState::Failed {
            step: Step::BuildPrompt,
            kind: ErrorKind::InvalidInput
        }
        .is_terminal());
        assert!(!WorkflowState::PromptBuilt.is_terminal());
    }
}
