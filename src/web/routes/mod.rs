pub mod channel_routes;
pub mod content_routes;
pub mod package_routes;

/// HTML forms send empty strings for untouched optional fields.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Splits a comma-separated topic list, dropping empty entries.
pub(crate) fn split_topics(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
