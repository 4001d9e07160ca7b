use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CancelToken, ErrorKind, Step, WorkflowError, WorkflowState};
use crate::generation::{ContentGenerator, ImageCandidateGenerator, PromptBuilder};
use crate::models::{new_package_id, GeneratedContent, InputData, Package, ProcessingLog};
use crate::state::{ChannelRegistry, PackageStore};

pub const DEFAULT_BATCH_CONCURRENCY: usize = 2;

/// Produces the id for a package created at the given time.
pub type PackageIdGenerator = fn(DateTime<Utc>) -> String;

/// Outcome of one topic within a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub topic: String,
    pub result: Result<Package, WorkflowError>,
}

/// Tracks one run's state and the processing log that ends up on the package.
struct RunTrace {
    state: WorkflowState,
    logs: Vec<ProcessingLog>,
}

impl RunTrace {
    fn new() -> Self {
        Self {
            state: WorkflowState::Init,
            logs: Vec::new(),
        }
    }

    fn advance(&mut self, state: WorkflowState, message: impl Into<String>) {
        let message = message.into();
        info!(from = ?self.state, to = ?state, "{message}");
        self.state = state;
        self.logs.push(ProcessingLog {
            at: Utc::now(),
            message,
        });
    }

    fn fail(&mut self, err: WorkflowError, step: Step) -> WorkflowError {
        let err = err.at(step);
        warn!(step = %step, kind = %err.kind, error = %err.message, "Workflow step failed.");
        self.state = WorkflowState::Failed {
            step,
            kind: err.kind,
        };
        err
    }
}

/// Runs the content pipeline: resolve the channel, build the prompt,
/// generate text, generate thumbnail candidates, store the package.
pub struct WorkflowOrchestrator {
    registry: Arc<ChannelRegistry>,
    packages: Arc<PackageStore>,
    prompt_builder: PromptBuilder,
    content: ContentGenerator,
    images: ImageCandidateGenerator,
    batch_concurrency: usize,
    id_generator: PackageIdGenerator,
}

impl WorkflowOrchestrator {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        packages: Arc<PackageStore>,
        content: ContentGenerator,
        images: ImageCandidateGenerator,
    ) -> Self {
        Self {
            registry,
            packages,
            prompt_builder: PromptBuilder::new(),
            content,
            images,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            id_generator: new_package_id,
        }
    }

    pub fn with_id_generator(mut self, id_generator: PackageIdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    pub async fn run(&self, input: InputData, cancel: &CancelToken) -> Result<Package, WorkflowError> {
        info!(channel_id = %input.channel_id, topic = %input.video_topic, "Starting workflow.");
        let mut trace = RunTrace::new();

        check_cancel(cancel, Step::ResolveChannel)?;
        let channel = self
            .registry
            .get(&input.channel_id)
            .map_err(|e| trace.fail(e.into(), Step::ResolveChannel))?;
        trace.advance(
            WorkflowState::ChannelResolved,
            format!("Resolved channel {}", channel.channel_id),
        );

        check_cancel(cancel, Step::BuildPrompt)?;
        let prompt = self
            .prompt_builder
            .build(&channel, &input)
            .map_err(|e| trace.fail(e.into(), Step::BuildPrompt))?;
        trace.advance(
            WorkflowState::PromptBuilt,
            format!("Built prompt ({} chars)", prompt.len()),
        );

        let frame = input.reference_frame.as_ref();
        if let Some(frame) = frame {
            info!(mime_type = %frame.mime_type, bytes = frame.data.len(), "Attaching reference frame.");
        }
        let generation = self.content.generate_with_frame(&prompt, frame);
        let content = race_cancel(cancel, Step::GenerateContent, generation)
            .await?
            .map_err(|e| trace.fail(e.into(), Step::GenerateContent))?;
        trace.advance(
            WorkflowState::ContentGenerated,
            format!("Generated content \"{}\" with {} tags", content.title, content.tags.len()),
        );

        let image_prompt = image_prompt_for(&content);
        let images = race_cancel(cancel, Step::GenerateImages, self.images.generate(&image_prompt))
            .await?
            .map_err(|e| trace.fail(e.into(), Step::GenerateImages))?;
        trace.advance(
            WorkflowState::ImagesGenerated,
            format!(
                "Generated {} image candidates via {}",
                images.urls.len(),
                self.images.provider_name()
            ),
        );

        check_cancel(cancel, Step::StorePackage)?;
        let created_at = Utc::now();
        let package_id = (self.id_generator)(created_at);
        let mut logs = std::mem::take(&mut trace.logs);
        logs.push(ProcessingLog {
            at: created_at,
            message: format!("Stored package {package_id}"),
        });
        let package = Package {
            package_id,
            channel_id: channel.channel_id,
            channel_name: channel.channel_name,
            video_topic: input.video_topic,
            content,
            images,
            created_at,
            logs,
        };
        self.packages
            .put(package.clone())
            .map_err(|e| trace.fail(e.into(), Step::StorePackage))?;
        trace.state = WorkflowState::PackageStored;

        info!(
            package_id = %package.package_id,
            channel_id = %package.channel_id,
            state = ?trace.state,
            "Workflow completed."
        );
        Ok(package)
    }

    /// Runs one independent workflow per non-blank topic with bounded
    /// concurrency. Results come back in topic order; a failed topic never
    /// stops the others.
    pub async fn run_batch(
        &self,
        channel_id: &str,
        topics: Vec<String>,
        additional_context: Option<String>,
        cancel: &CancelToken,
    ) -> Result<Vec<BatchItem>, WorkflowError> {
        self.registry.get(channel_id)?;

        let topics: Vec<String> = topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(WorkflowError::new(
                ErrorKind::InvalidInput,
                "At least one non-blank topic is required",
            ));
        }

        info!(channel_id = %channel_id, topics = topics.len(), concurrency = self.batch_concurrency, "Starting batch.");

        let items: Vec<BatchItem> = stream::iter(topics)
            .map(|topic| {
                let mut input = InputData::new(channel_id, topic.clone());
                input.additional_context = additional_context.clone();
                async move {
                    let result = self.run(input, cancel).await;
                    BatchItem { topic, result }
                }
            })
            .buffered(self.batch_concurrency)
            .collect()
            .await;

        let failed = items.iter().filter(|item| item.result.is_err()).count();
        info!(channel_id = %channel_id, succeeded = items.len() - failed, failed, "Batch finished.");
        Ok(items)
    }
}

fn check_cancel(cancel: &CancelToken, step: Step) -> Result<(), WorkflowError> {
    if cancel.is_cancelled() {
        warn!(step = %step, "Workflow cancelled.");
        return Err(WorkflowError::cancelled(step));
    }
    Ok(())
}

async fn race_cancel<F, T>(cancel: &CancelToken, step: Step, fut: F) -> Result<T, WorkflowError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(step = %step, "Workflow cancelled while waiting on provider.");
            Err(WorkflowError::cancelled(step))
        }
        output = fut => Ok(output),
    }
}

fn image_prompt_for(content: &GeneratedContent) -> String {
    content
        .image_prompts
        .iter()
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .unwrap_or(content.title.as_str())
        .to_string()
}
