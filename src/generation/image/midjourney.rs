use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ImageProvider;
use crate::generation::{status_error, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.piapi.ai";

/// Image provider backed by a Midjourney-proxy task API.
///
/// An `imagine` task is submitted, then polled until it completes. A
/// completed task yields the grid's individual image URLs.
pub struct MidjourneyProvider {
    client: Client,
    api_key: String,
    base_url: String,
    process_mode: String,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Serialize)]
struct ImagineInput<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    process_mode: &'a str,
}

#[derive(Serialize)]
struct TaskRequest<'a> {
    model: &'a str,
    task_type: &'a str,
    input: ImagineInput<'a>,
}

enum TaskStatus {
    Completed(Vec<String>),
    Failed(String),
    Pending,
}

impl MidjourneyProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into().trim().to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            process_mode: "fast".to_string(),
            poll_interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_process_mode(mut self, process_mode: impl Into<String>) -> Self {
        self.process_mode = process_mode.into();
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    async fn submit(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = TaskRequest {
            model: "midjourney",
            task_type: "imagine",
            input: ImagineInput {
                prompt,
                aspect_ratio: "16:9",
                process_mode: &self.process_mode,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/v1/task", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response.json().await?;
        task_data(&body)["task_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse(format!("no task_id in response: {body}")))
    }

    async fn poll(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/v1/task/{task_id}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response.json().await?;
        Ok(parse_task_status(&body))
    }
}

/// The proxy wraps payloads as `{code, data: {...}}`; older deployments
/// answer with the task object at the root.
fn task_data(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    }
}

fn parse_task_status(body: &Value) -> TaskStatus {
    let data = task_data(body);
    match data["status"].as_str().map(str::to_ascii_lowercase).as_deref() {
        Some("completed") | Some("finished") | Some("success") => {
            TaskStatus::Completed(extract_image_urls(&data["output"]))
        }
        Some("failed") => {
            let message = data["error"]["message"]
                .as_str()
                .or_else(|| data["error"].as_str())
                .or_else(|| body["message"].as_str())
                .unwrap_or("task failed without a reason")
                .to_string();
            TaskStatus::Failed(message)
        }
        _ => TaskStatus::Pending,
    }
}

fn extract_image_urls(output: &Value) -> Vec<String> {
    let candidates: Vec<&Value> = if let Some(list) = output["image_urls"].as_array() {
        list.iter().collect()
    } else if let Some(list) = output["temporary_image_urls"].as_array() {
        list.iter().collect()
    } else if output["image_url"].is_string() {
        vec![&output["image_url"]]
    } else {
        Vec::new()
    };

    candidates
        .into_iter()
        .filter_map(Value::as_str)
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ImageProvider for MidjourneyProvider {
    fn name(&self) -> &str {
        "midjourney"
    }

    async fn imagine(&self, prompt: &str) -> Result<Vec<String>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::InvalidConfiguration(
                "Midjourney API key is empty".to_string(),
            ));
        }

        let task_id = self.submit(prompt).await?;
        info!(task_id = %task_id, "Midjourney task submitted.");

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            match self.poll(&task_id).await? {
                TaskStatus::Completed(urls) => {
                    info!(task_id = %task_id, count = urls.len(), "Midjourney task completed.");
                    return Ok(urls);
                }
                TaskStatus::Failed(reason) => {
                    warn!(task_id = %task_id, reason = %reason, "Midjourney task failed.");
                    return Err(ProviderError::TaskFailed(reason));
                }
                TaskStatus::Pending => {
                    debug!(task_id = %task_id, attempt, max = self.max_polls, "Midjourney task still running.");
                }
            }
        }

        Err(ProviderError::Timeout(self.poll_interval * self.max_polls))
    }
}
