use std::sync::Arc;
use tracing::info;

use super::config::{ConfigError, ServerConfig};
use crate::generation::image::MidjourneyProvider;
use crate::generation::text::{GeminiProvider, OpenAiProvider};
use crate::generation::{ContentGenerator, ImageCandidateGenerator, TextProvider};
use crate::state::{ChannelRegistry, PackageStore};
use crate::workflow::WorkflowOrchestrator;

/// Text providers in fallback order: Gemini first, then OpenAI.
pub fn text_providers(config: &ServerConfig) -> Vec<Arc<dyn TextProvider>> {
    let mut providers: Vec<Arc<dyn TextProvider>> = Vec::new();
    if let Some(key) = &config.gemini_api_key {
        providers.push(Arc::new(
            GeminiProvider::new(key.as_str(), config.gemini_model.as_str())
                .with_base_url(config.gemini_base_url.as_str())
                .with_temperature(config.temperature),
        ));
    }
    if let Some(key) = &config.openai_api_key {
        providers.push(Arc::new(
            OpenAiProvider::new(key.as_str(), config.openai_model.as_str())
                .with_base_url(config.openai_base_url.as_str())
                .with_temperature(config.temperature),
        ));
    }
    providers
}

pub fn build_orchestrator(
    config: &ServerConfig,
    registry: Arc<ChannelRegistry>,
    packages: Arc<PackageStore>,
) -> Result<WorkflowOrchestrator, ConfigError> {
    let providers = text_providers(config);
    if providers.is_empty() {
        return Err(ConfigError::Invalid("no text provider configured".to_string()));
    }
    let image_key = config
        .midjourney_api_key
        .as_deref()
        .ok_or_else(|| ConfigError::Invalid("no image provider configured".to_string()))?;

    let content = ContentGenerator::new(providers, config.text_timeout(), config.max_tags);
    info!(providers = ?content.provider_names(), "Text providers configured.");

    let midjourney = MidjourneyProvider::new(image_key)
        .with_base_url(config.midjourney_base_url.as_str())
        .with_process_mode(config.midjourney_process_mode.as_str())
        .with_polling(config.image_poll_interval(), config.image_max_polls);
    let images = ImageCandidateGenerator::new(Arc::new(midjourney), config.image_timeout());

    Ok(WorkflowOrchestrator::new(registry, packages, content, images)
        .with_batch_concurrency(config.batch_concurrency))
}
