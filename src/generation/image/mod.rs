use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::ProviderError;
use crate::models::{ImageCandidateSet, CANDIDATE_COUNT};

pub mod midjourney;

pub use midjourney::MidjourneyProvider;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Image provider returned {got} images, expected {expected}")]
    IncompleteBatch { expected: usize, got: usize },
}

/// An image-generation backend returning provider-hosted image URLs.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn imagine(&self, prompt: &str) -> Result<Vec<String>, ProviderError>;
}

/// Produces exactly [`CANDIDATE_COUNT`] thumbnail candidates per prompt.
pub struct ImageCandidateGenerator {
    provider: Arc<dyn ImageProvider>,
    timeout: Duration,
}

impl ImageCandidateGenerator {
    pub fn new(provider: Arc<dyn ImageProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<ImageCandidateSet, ImageError> {
        let urls = match tokio::time::timeout(self.timeout, self.provider.imagine(prompt)).await {
            Ok(Ok(urls)) => urls,
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), error = %e, "Image provider failed.");
                return Err(ImageError::ProviderUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(provider = self.provider.name(), timeout = ?self.timeout, "Image provider timed out.");
                return Err(ImageError::ProviderUnavailable(
                    ProviderError::Timeout(self.timeout).to_string(),
                ));
            }
        };

        if urls.len() < CANDIDATE_COUNT {
            return Err(ImageError::IncompleteBatch {
                expected: CANDIDATE_COUNT,
                got: urls.len(),
            });
        }

        info!(provider = self.provider.name(), count = urls.len(), "Image candidates generated.");
        Ok(ImageCandidateSet::new(
            prompt,
            urls.into_iter().take(CANDIDATE_COUNT).collect(),
        ))
    }
}
