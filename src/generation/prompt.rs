use tera::{Context, Tera};
use thiserror::Error;

use crate::models::{ChannelConfig, InputData};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PromptError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Prompt templating error: {0}")]
    Template(String),
}

const NOT_SPECIFIED: &str = "Not specified";

const CONTENT_PROMPT_TEMPLATE: &str = r#"You are an expert YouTube content creator and SEO specialist. Generate a complete content package for one video.

**Channel Information:**
- Channel Name: {{ channel_name }}
- Channel Description: {{ channel_description }}
- Content Style: {{ content_style }}
- Target Audience: {{ target_audience }}
- Main Topics: {{ content_topics }}

**Video Topic:** {{ video_topic }}
{% if additional_context %}
**Additional Context:** {{ additional_context }}
{% endif %}{% if has_reference_frame %}
**Reference Frame:** a still from the video is attached. Use what it shows to make the title, description and thumbnail match the footage.
{% endif %}
**Requirements:**
1. TITLE (60-70 characters): primary keyword first, emotionally engaging, clickable but not misleading.
2. DESCRIPTION (800-1500 characters): hook within the first 125 characters, scannable structure, call-to-action, relevant hashtags.
3. TAGS (10-15 tags): mix of broad and specific keywords, no punctuation inside tags.
4. THUMBNAIL_TEXT (2-3 words): high-impact overlay text that complements the title.
5. IMAGE_PROMPTS (3 prompts): detailed prompts for a 16:9 YouTube thumbnail with negative space for text overlay.

**Output Format:** respond with a single JSON object and nothing else:
{"title": "...", "description": "...", "tags": ["tag1", "tag2"], "thumbnail_text": "...", "image_prompts": ["...", "...", "..."]}
"#;

/// Builds the text-generation prompt for one video from channel metadata.
/// Pure: the same channel and input always render the same prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, channel: &ChannelConfig, input: &InputData) -> Result<String, PromptError> {
        let channel_name = required("channel_name", &channel.channel_name)?;
        let channel_description = required("channel_description", &channel.channel_description)?;
        let video_topic = required("video_topic", &input.video_topic)?;

        let topics: Vec<&str> = channel
            .content_topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let content_topics = if topics.is_empty() {
            "Varied".to_string()
        } else {
            topics.join(", ")
        };

        let mut context = Context::new();
        context.insert("channel_name", channel_name);
        context.insert("channel_description", channel_description);
        context.insert("content_style", or_not_specified(&channel.content_style));
        context.insert("target_audience", or_not_specified(&channel.target_audience));
        context.insert("content_topics", &content_topics);
        context.insert("video_topic", video_topic);
        context.insert(
            "additional_context",
            &input
                .additional_context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty()),
        );

        context.insert("has_reference_frame", &input.reference_frame.is_some());

        Tera::one_off(CONTENT_PROMPT_TEMPLATE, &context, false)
            .map_err(|e| PromptError::Template(e.to_string()))
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, PromptError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PromptError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn or_not_specified(value: &Option<String>) -> &str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceFrame;

    fn channel() -> ChannelConfig {
        let mut channel = ChannelConfig::new("tech", "Tech", "Technology explained simply")
            .with_topics(["AI", "Gadgets"]);
        channel.content_style = Some("Educational".to_string());
        channel
    }

    #[test]
    fn test_build_includes_channel_and_topic() {
        let prompt = PromptBuilder::new()
            .build(&channel(), &InputData::new("tech", "Intro to AI"))
            .unwrap();
        assert!(prompt.contains("- Channel Name: Tech"));
        assert!(prompt.contains("- Channel Description: Technology explained simply"));
        assert!(prompt.contains("- Content Style: Educational"));
        assert!(prompt.contains("- Target Audience: Not specified"));
        assert!(prompt.contains("- Main Topics: AI, Gadgets"));
        assert!(prompt.contains("**Video Topic:** Intro to AI"));
        assert!(!prompt.contains("Additional Context"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::new();
        let input = InputData::new("tech", "Intro to AI").with_context("Keep it short");
        let a = builder.build(&channel(), &input).unwrap();
        let b = builder.build(&channel(), &input).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("**Additional Context:** Keep it short"));
    }

    #[test]
    fn test_build_does_not_escape_text() {
        let mut channel = channel();
        channel.channel_name = "Tom & Jerry's <Lab>".to_string();
        let prompt = PromptBuilder::new()
            .build(&channel, &InputData::new("tech", "A \"quoted\" topic"))
            .unwrap();
        assert!(prompt.contains("Tom & Jerry's <Lab>"));
        assert!(prompt.contains("A \"quoted\" topic"));
    }

    #[test]
    fn test_empty_topics_fall_back() {
        let mut channel = channel();
        channel.content_topics = vec![" ".to_string()];
        let prompt = PromptBuilder::new()
            .build(&channel, &InputData::new("tech", "x"))
            .unwrap();
        assert!(prompt.contains("- Main Topics: Varied"));
    }

    #[test]
    fn test_blank_required_fields_rejected() {
        let builder = PromptBuilder::new();
        let err = builder
            .build(&channel(), &InputData::new("tech", "   "))
            .unwrap_err();
        assert_eq!(err, PromptError::InvalidInput("video_topic is required".to_string()));

        let mut nameless = channel();
        nameless.channel_name.clear();
        assert!(matches!(
            builder.build(&nameless, &InputData::new("tech", "x")),
            Err(PromptError::InvalidInput(_))
        ));

        let blank_context = InputData::new("tech", "x").with_context("  ");
        let prompt = builder.build(&channel(), &blank_context).unwrap();
        assert!(!prompt.contains("Additional Context"));
    }

    #[test]
    fn test_reference_frame_adds_section() {
        let builder = PromptBuilder::new();
        let plain = builder.build(&channel(), &InputData::new("tech", "Drones")).unwrap();
        assert!(!plain.contains("Reference Frame"));

        let framed = InputData::new("tech", "Drones")
            .with_reference_frame(ReferenceFrame::new("image/png", vec![1, 2, 3]));
        let prompt = builder.build(&channel(), &framed).unwrap();
        assert!(prompt.contains("**Reference Frame:**"));
        assert!(prompt.contains("**Video Topic:** Drones"));
    }
}
