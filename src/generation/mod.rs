use thiserror::Error;

pub mod diversity;
pub mod image;
pub mod parse;
pub mod prompt;
pub mod text;

pub use diversity::DiversityTracker;
pub use image::{ImageCandidateGenerator, ImageError, ImageProvider};
pub use prompt::{PromptBuilder, PromptError};
pub use text::{ContentError, ContentGenerator, TextProvider};

/// Failure of a single call to an external AI provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(reqwest::Error),
    #[error("Provider returned non-success status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("Provider task failed: {0}")]
    TaskFailed(String),
    #[error("Provider call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Invalid provider configuration: {0}")]
    InvalidConfiguration(String),
}

// Request URLs can carry credentials, so they never reach error text.
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.without_url())
    }
}

/// Reads the body of a non-success response into a [`ProviderError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    ProviderError::Status { status, body }
}
