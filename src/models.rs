use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of thumbnail candidates produced per package.
pub const CANDIDATE_COUNT: usize = 4;

/// Descriptive metadata for one YouTube channel, used to steer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_description: String,
    pub content_style: Option<String>,
    pub target_audience: Option<String>,
    #[serde(default)]
    pub content_topics: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ChannelConfig {
    pub fn new(
        channel_id: impl Into<String>,
        channel_name: impl Into<String>,
        channel_description: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            channel_description: channel_description.into(),
            content_style: None,
            target_audience: None,
            content_topics: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_topics = topics.into_iter().map(Into::into).collect();
        self
    }
}

/// Replacement values for the mutable fields of a [`ChannelConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUpdate {
    pub channel_name: String,
    pub channel_description: String,
    pub content_style: Option<String>,
    pub target_audience: Option<String>,
    pub content_topics: Vec<String>,
    pub is_active: bool,
}

/// Largest reference frame accepted alongside a content request.
pub const MAX_REFERENCE_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// A still from the video, sent to the text provider as visual context.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceFrame {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Per-request input for one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputData {
    pub channel_id: String,
    pub video_topic: String,
    pub additional_context: Option<String>,
    #[serde(skip)]
    pub reference_frame: Option<ReferenceFrame>,
}

impl InputData {
    pub fn new(channel_id: impl Into<String>, video_topic: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            video_topic: video_topic.into(),
            additional_context: None,
            reference_frame: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn with_reference_frame(mut self, frame: ReferenceFrame) -> Self {
        self.reference_frame = Some(frame);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub thumbnail_text: Option<String>,
    #[serde(default)]
    pub image_prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCandidateSet {
    pub prompt: String,
    pub urls: Vec<String>,
    pub selected_index: Option<usize>,
    pub selected_url: Option<String>,
}

impl ImageCandidateSet {
    pub fn new(prompt: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            urls,
            selected_index: None,
            selected_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// The bundled output of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub package_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub video_topic: String,
    pub content: GeneratedContent,
    pub images: ImageCandidateSet,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<ProcessingLog>,
}

impl Package {
    pub fn add_log(&mut self, message: impl Into<String>) {
        self.logs.push(ProcessingLog {
            at: Utc::now(),
            message: message.into(),
        });
    }
}

/// Generates a package id of the form `pkg_<YYYYmmddHHMMSS>_<12 hex>`.
pub fn new_package_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("pkg_{}_{}", now.format("%Y%m%d%H%M%S"), &suffix[..12])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatistics {
    pub channel_id: String,
    pub channel_name: String,
    pub total: usize,
    pub with_selection: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_format() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 5, 1, 13, 2, 3).unwrap();
        let id = new_package_id(now);
        assert!(id.starts_with("pkg_20240501130203_"));
        assert_eq!(id.len(), "pkg_20240501130203_".len() + 12);
        assert_ne!(id, new_package_id(now));
    }

    #[test]
    fn test_reference_frame_data_url() {
        let frame = ReferenceFrame::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(frame.to_base64(), "iVBORw==");
        assert_eq!(frame.data_url(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_channel_deserialize_defaults() {
        let json = serde_json::json!({
            "channel_id": "tech",
            "channel_name": "Tech",
            "channel_description": "All about tech",
            "content_style": null,
            "target_audience": null,
            "created_at": "2024-05-01T00:00:00Z"
        });
        let channel: ChannelConfig = serde_json::from_value(json).unwrap();
        assert!(channel.is_active);
        assert!(channel.content_topics.is_empty());
    }
}
