#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tubeforge::generation::{
    ContentGenerator, ImageCandidateGenerator, ImageProvider, ProviderError, TextProvider,
};
use tubeforge::models::{ChannelConfig, ReferenceFrame};
use tubeforge::state::{ChannelRegistry, PackageStore};
use tubeforge::workflow::WorkflowOrchestrator;

/// Answers with valid content whose title echoes the prompt's video topic.
#[derive(Default)]
pub struct EchoTextProvider {
    pub calls: AtomicU32,
    pub frames: AtomicU32,
}

#[async_trait]
impl TextProvider for EchoTextProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        prompt: &str,
        frame: Option<&ReferenceFrame>,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if frame.is_some() {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
        let topic = prompt
            .lines()
            .find_map(|line| line.strip_prefix("**Video Topic:** "))
            .unwrap_or("unknown")
            .trim();
        Ok(json!({
            "title": topic,
            "description": format!("Everything about {topic}."),
            "tags": ["tech", "#review", "Tech"],
            "thumbnail_text": "WOW",
        })
        .to_string())
    }
}

/// Returns four URLs, or three when the prompt mentions "broken".
/// An optional delay simulates a slow render.
pub struct FakeImageProvider {
    pub calls: AtomicU32,
    pub delay: Duration,
}

impl FakeImageProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay,
        }
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    fn name(&self) -> &str {
        "fake-images"
    }

    async fn imagine(&self, prompt: &str) -> Result<Vec<String>, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if prompt.contains("broken") {
            return Err(ProviderError::TaskFailed("render crashed".to_string()));
        }
        Ok((0..4)
            .map(|i| format!("https://img.test/{n}/{i}.png"))
            .collect())
    }
}

pub struct Harness {
    pub registry: Arc<ChannelRegistry>,
    pub packages: Arc<PackageStore>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub text: Arc<EchoTextProvider>,
    pub images: Arc<FakeImageProvider>,
}

pub fn harness_with(images: FakeImageProvider) -> Harness {
    let registry = Arc::new(ChannelRegistry::new());
    let packages = Arc::new(PackageStore::new());
    let text = Arc::new(EchoTextProvider::default());
    let images = Arc::new(images);

    let content = ContentGenerator::new(
        vec![text.clone() as Arc<dyn TextProvider>],
        Duration::from_secs(5),
        15,
    );
    let image_generator =
        ImageCandidateGenerator::new(images.clone() as Arc<dyn ImageProvider>, Duration::from_secs(5));
    let orchestrator = Arc::new(
        WorkflowOrchestrator::new(registry.clone(), packages.clone(), content, image_generator)
            .with_batch_concurrency(2),
    );

    Harness {
        registry,
        packages,
        orchestrator,
        text,
        images,
    }
}

pub fn harness() -> Harness {
    harness_with(FakeImageProvider::new())
}

pub fn tech_channel() -> ChannelConfig {
    let mut channel = ChannelConfig::new("tech", "Tech Reviews", "Honest reviews of consumer tech.")
        .with_topics(["AI", "gadgets"]);
    channel.content_style = Some("casual".to_string());
    channel.target_audience = Some("18-35".to_string());
    channel
}
