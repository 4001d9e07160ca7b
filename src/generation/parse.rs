use serde::Deserialize;

use crate::models::GeneratedContent;

/// Tags may come back as a JSON array or a single comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<String>),
    Joined(String),
}

#[derive(Deserialize)]
struct RawContent {
    title: Option<String>,
    description: Option<String>,
    tags: Option<RawTags>,
    thumbnail_text: Option<String>,
    #[serde(default)]
    image_prompts: Vec<String>,
}

/// Decomposes a text-provider reply into [`GeneratedContent`].
///
/// Accepts bare JSON, a fenced ```json block, or JSON embedded in prose.
/// Returns a human-readable reason on failure.
pub fn parse_generated_content(response: &str, max_tags: usize) -> Result<GeneratedContent, String> {
    let json = extract_json_object(response)
        .ok_or_else(|| "response does not contain a JSON object".to_string())?;
    let raw: RawContent =
        serde_json::from_str(json).map_err(|e| format!("response JSON is malformed: {e}"))?;

    let title = non_blank(raw.title).ok_or_else(|| "response is missing a title".to_string())?;
    let description =
        non_blank(raw.description).ok_or_else(|| "response is missing a description".to_string())?;

    let tags = match raw.tags {
        Some(RawTags::List(list)) => normalize_tags(list, max_tags),
        Some(RawTags::Joined(joined)) => {
            normalize_tags(joined.split(',').map(str::to_string), max_tags)
        }
        None => Vec::new(),
    };

    let image_prompts = raw
        .image_prompts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    Ok(GeneratedContent {
        title,
        description,
        tags,
        thumbnail_text: non_blank(raw.thumbnail_text),
        image_prompts,
    })
}

fn extract_json_object(response: &str) -> Option<&str> {
    let body = match response.find("```") {
        Some(fence_start) => {
            let after_fence = &response[fence_start + 3..];
            // Skip the info string, e.g. "json".
            let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
            let content = &after_fence[content_start..];
            match content.find("```") {
                Some(end) => &content[..end],
                None => content,
            }
        }
        None => response,
    };

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_tags(tags: impl IntoIterator<Item = String>, max_tags: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max_tags)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json() {
        let content = parse_generated_content(
            r#"{"title": "Intro to AI", "description": "Learn AI.", "tags": ["ai", "ml"], "thumbnail_text": "AI 101", "image_prompts": ["robot tutor"]}"#,
            15,
        )
        .unwrap();
        assert_eq!(content.title, "Intro to AI");
        assert_eq!(content.description, "Learn AI.");
        assert_eq!(content.tags, vec!["ai", "ml"]);
        assert_eq!(content.thumbnail_text.as_deref(), Some("AI 101"));
        assert_eq!(content.image_prompts, vec!["robot tutor"]);
    }

    #[test]
    fn test_parse_fenced_block_with_prose() {
        let response = "Here you go!\n```json\n{\"title\": \"T\", \"description\": \"D\", \"tags\": \"a, #b, , A\"}\n```\nEnjoy {not json}";
        let content = parse_generated_content(response, 15).unwrap();
        assert_eq!(content.title, "T");
        assert_eq!(content.tags, vec!["a", "b"]);
        assert!(content.thumbnail_text.is_none());
        assert!(content.image_prompts.is_empty());
    }

    #[test]
    fn test_parse_embedded_json() {
        let response = "Sure: {\"title\": \"T\", \"description\": \"D\"} hope it helps";
        let content = parse_generated_content(response, 15).unwrap();
        assert_eq!(content.title, "T");
        assert!(content.tags.is_empty());
    }

    #[test]
    fn test_tags_capped() {
        let tags: Vec<String> = (0..30).map(|i| format!("\"tag{i}\"")).collect();
        let response = format!(
            "{{\"title\": \"T\", \"description\": \"D\", \"tags\": [{}]}}",
            tags.join(",")
        );
        let content = parse_generated_content(&response, 15).unwrap();
        assert_eq!(content.tags.len(), 15);
        assert_eq!(content.tags[0], "tag0");
    }

    #[test]
    fn test_missing_structure_is_error() {
        assert!(parse_generated_content("no json here", 15)
            .unwrap_err()
            .contains("does not contain"));
        assert!(parse_generated_content("{\"description\": \"D\"}", 15)
            .unwrap_err()
            .contains("title"));
        assert!(parse_generated_content("{\"title\": \"T\", \"description\": \"  \"}", 15)
            .unwrap_err()
            .contains("description"));
        assert!(parse_generated_content("{\"title\": ", 15).is_err());
    }
}
