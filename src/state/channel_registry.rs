use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

use crate::models::{ChannelConfig, ChannelUpdate};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
    #[error("Channel already exists: {0}")]
    DuplicateChannel(String),
    #[error("Invalid channel: {0}")]
    InvalidInput(String),
}

struct RegistryEntry {
    seq: u64,
    channel: ChannelConfig,
}

/// In-memory channel metadata keyed by channel id.
///
/// Mutations lock only the entry they touch. `list` returns channels in the
/// order they were registered.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, RegistryEntry>,
    next_seq: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, channel: ChannelConfig) -> Result<ChannelConfig, RegistryError> {
        validate_required("channel_id", &channel.channel_id)?;
        validate_required("channel_name", &channel.channel_name)?;
        validate_required("channel_description", &channel.channel_description)?;

        match self.channels.entry(channel.channel_id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateChannel(channel.channel_id)),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                info!(channel_id = %channel.channel_id, "Registered channel.");
                slot.insert(RegistryEntry {
                    seq,
                    channel: channel.clone(),
                });
                Ok(channel)
            }
        }
    }

    pub fn get(&self, channel_id: &str) -> Result<ChannelConfig, RegistryError> {
        self.channels
            .get(channel_id)
            .map(|entry| entry.channel.clone())
            .ok_or_else(|| RegistryError::ChannelNotFound(channel_id.to_string()))
    }

    pub fn update(
        &self,
        channel_id: &str,
        update: ChannelUpdate,
    ) -> Result<ChannelConfig, RegistryError> {
        validate_required("channel_name", &update.channel_name)?;
        validate_required("channel_description", &update.channel_description)?;

        let mut entry = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| RegistryError::ChannelNotFound(channel_id.to_string()))?;

        let channel = &mut entry.channel;
        channel.channel_name = update.channel_name;
        channel.channel_description = update.channel_description;
        channel.content_style = update.content_style;
        channel.target_audience = update.target_audience;
        channel.content_topics = update.content_topics;
        channel.is_active = update.is_active;

        info!(channel_id = %channel_id, "Updated channel.");
        Ok(channel.clone())
    }

    /// Removes the channel. Packages created under it are left untouched.
    pub fn delete(&self, channel_id: &str) -> Result<ChannelConfig, RegistryError> {
        let (_, entry) = self
            .channels
            .remove(channel_id)
            .ok_or_else(|| RegistryError::ChannelNotFound(channel_id.to_string()))?;
        info!(channel_id = %channel_id, "Deleted channel.");
        Ok(entry.channel)
    }

    pub fn list(&self) -> Vec<ChannelConfig> {
        let mut entries: Vec<(u64, ChannelConfig)> = self
            .channels
            .iter()
            .map(|entry| (entry.seq, entry.channel.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, channel)| channel).collect()
    }

    pub fn list_active(&self) -> Vec<ChannelConfig> {
        self.list().into_iter().filter(|c| c.is_active).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&self) {
        self.channels.clear();
    }
}

fn validate_required(field: &str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech() -> ChannelConfig {
        ChannelConfig::new("tech", "Tech", "Technology explained").with_topics(["AI"])
    }

    #[test]
    fn test_create_then_get_returns_stored_fields() {
        let registry = ChannelRegistry::new();
        let created = registry.create(tech()).unwrap();
        let fetched = registry.get("tech").unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.content_topics, vec!["AI".to_string()]);
    }

    #[test]
    fn test_duplicate_create_fails() {
        let registry = ChannelRegistry::new();
        registry.create(tech()).unwrap();
        let err = registry.create(tech()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateChannel("tech".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_rejects_blank_fields() {
        let registry = ChannelRegistry::new();
        let err = registry
            .create(ChannelConfig::new("x", "  ", "desc"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_keeps_id_and_created_at() {
        let registry = ChannelRegistry::new();
        let original = registry.create(tech()).unwrap();
        let updated = registry
            .update(
                "tech",
                ChannelUpdate {
                    channel_name: "Tech Weekly".to_string(),
                    channel_description: "Weekly tech".to_string(),
                    content_style: Some("casual".to_string()),
                    target_audience: None,
                    content_topics: vec!["AI".to_string(), "Rust".to_string()],
                    is_active: false,
                },
            )
            .unwrap();
        assert_eq!(updated.channel_id, "tech");
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.channel_name, "Tech Weekly");
        assert!(!updated.is_active);
        assert_eq!(registry.get("tech").unwrap(), updated);
    }

    #[test]
    fn test_missing_channel_operations() {
        let registry = ChannelRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(RegistryError::ChannelNotFound(_))
        ));
        assert!(matches!(
            registry.delete("nope"),
            Err(RegistryError::ChannelNotFound(_))
        ));
        let update = ChannelUpdate {
            channel_name: "n".to_string(),
            channel_description: "d".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            registry.update("nope", update),
            Err(RegistryError::ChannelNotFound(_))
        ));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = ChannelRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry.create(ChannelConfig::new(id, id, "desc")).unwrap();
        }
        registry.delete("alpha").unwrap();
        registry.create(ChannelConfig::new("alpha", "alpha", "desc")).unwrap();

        let ids: Vec<String> = registry.list().into_iter().map(|c| c.channel_id).collect();
        assert_eq!(ids, vec!["zeta", "mid", "alpha"]);
    }

    #[test]
    fn test_list_active_filters_inactive() {
        let registry = ChannelRegistry::new();
        let mut inactive = ChannelConfig::new("old", "Old", "desc");
        inactive.is_active = false;
        registry.create(inactive).unwrap();
        registry.create(tech()).unwrap();
        let active = registry.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].channel_id, "tech");
    }
}
