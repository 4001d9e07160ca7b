use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::diversity::DiversityTracker;
use super::parse::parse_generated_content;
use super::ProviderError;
use crate::models::{GeneratedContent, ReferenceFrame};

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("No text provider available: {0}")]
    ProviderUnavailable(String),
    #[error("Could not parse provider response: {0}")]
    ParseError(String),
}

/// A text-generation backend. Implementations turn one prompt into the raw
/// completion text; parsing is done by [`ContentGenerator`].
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `frame` is an optional still image sent alongside the prompt.
    async fn complete(
        &self,
        prompt: &str,
        frame: Option<&ReferenceFrame>,
    ) -> Result<String, ProviderError>;
}

/// Tries its providers in order until one answers.
pub struct ContentGenerator {
    providers: Vec<Arc<dyn TextProvider>>,
    timeout: Duration,
    max_tags: usize,
    diversity: DiversityTracker,
}

impl ContentGenerator {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>, timeout: Duration, max_tags: usize) -> Self {
        Self {
            providers,
            timeout,
            max_tags,
            diversity: DiversityTracker::new(),
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn generate(&self, prompt: &str) -> Result<GeneratedContent, ContentError> {
        self.generate_with_frame(prompt, None).await
    }

    /// Appends the recent-output diversity hints to `prompt`, then walks the
    /// provider chain. Successful parses are fed back into the history.
    pub async fn generate_with_frame(
        &self,
        prompt: &str,
        frame: Option<&ReferenceFrame>,
    ) -> Result<GeneratedContent, ContentError> {
        let mut full_prompt = prompt.to_string();
        full_prompt.push_str(&self.diversity.instruction().await);
        let mut last_failure = "no text providers configured".to_string();

        for provider in &self.providers {
            let call = provider.complete(&full_prompt, frame);
            let outcome = match tokio::time::timeout(self.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(text) => {
                    info!(provider = provider.name(), chars = text.len(), "Text provider answered.");
                    let content = parse_generated_content(&text, self.max_tags)
                        .map_err(ContentError::ParseError)?;
                    self.diversity.record(&content).await;
                    return Ok(content);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Text provider failed, trying next.");
                    last_failure = format!("{}: {e}", provider.name());
                }
            }
        }

        Err(ContentError::ProviderUnavailable(last_failure))
    }
}
