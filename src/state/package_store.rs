use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ChannelStatistics, Package, CANDIDATE_COUNT};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackageStoreError {
    #[error("Package not found: {0}")]
    PackageNotFound(String),
    #[error("Package id already in use: {0}")]
    DuplicateId(String),
    #[error("Image index {index} is out of range (0..{len})")]
    IndexOutOfRange { index: i64, len: usize },
}

/// Eviction limits for [`PackageStore::cleanup`]. Both limits are optional;
/// age is applied first, then count.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupPolicy {
    pub max_age: Option<Duration>,
    pub max_count: Option<usize>,
}

impl CleanupPolicy {
    pub fn max_age(age: Duration) -> Self {
        Self {
            max_age: Some(age),
            max_count: None,
        }
    }

    pub fn max_count(count: usize) -> Self {
        Self {
            max_age: None,
            max_count: Some(count),
        }
    }
}

struct StoredPackage {
    seq: u64,
    package: Package,
}

/// In-memory package storage. Nothing here survives a restart.
#[derive(Default)]
pub struct PackageStore {
    packages: DashMap<String, StoredPackage>,
    next_seq: AtomicU64,
}

impl PackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, package: Package) -> Result<(), PackageStoreError> {
        match self.packages.entry(package.package_id.clone()) {
            Entry::Occupied(_) => Err(PackageStoreError::DuplicateId(package.package_id)),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredPackage { seq, package });
                Ok(())
            }
        }
    }

    pub fn get(&self, package_id: &str) -> Result<Package, PackageStoreError> {
        self.packages
            .get(package_id)
            .map(|stored| stored.package.clone())
            .ok_or_else(|| PackageStoreError::PackageNotFound(package_id.to_string()))
    }

    /// Records the chosen thumbnail. The index is validated before the
    /// package is looked up, and the whole selection is written under the
    /// entry's write guard.
    pub fn select_image(&self, package_id: &str, index: i64) -> Result<Package, PackageStoreError> {
        let slot = usize::try_from(index)
            .ok()
            .filter(|i| *i < CANDIDATE_COUNT)
            .ok_or(PackageStoreError::IndexOutOfRange {
                index,
                len: CANDIDATE_COUNT,
            })?;

        let mut stored = self
            .packages
            .get_mut(package_id)
            .ok_or_else(|| PackageStoreError::PackageNotFound(package_id.to_string()))?;

        let package = &mut stored.package;
        let url = package
            .images
            .urls
            .get(slot)
            .cloned()
            .ok_or(PackageStoreError::IndexOutOfRange {
                index,
                len: package.images.urls.len(),
            })?;

        package.images.selected_index = Some(slot);
        package.images.selected_url = Some(url);
        package.add_log(format!("Selected image {slot}"));
        info!(package_id = %package_id, index = slot, "Image selected.");

        Ok(package.clone())
    }

    pub fn list_by_channel(&self, channel_id: &str) -> Vec<Package> {
        self.sorted(|p| p.channel_id == channel_id)
    }

    pub fn list_all(&self) -> Vec<Package> {
        self.sorted(|_| true)
    }

    pub fn cleanup(&self, policy: CleanupPolicy) -> usize {
        self.cleanup_at(policy, Utc::now())
    }

    pub(crate) fn cleanup_at(&self, policy: CleanupPolicy, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;

        if let Some(max_age) = policy.max_age {
            let cutoff = now - max_age;
            self.packages.retain(|_, stored| {
                let keep = stored.package.created_at >= cutoff;
                if !keep {
                    evicted += 1;
                }
                keep
            });
        }

        if let Some(max_count) = policy.max_count {
            let mut by_age: Vec<(DateTime<Utc>, u64, String)> = self
                .packages
                .iter()
                .map(|entry| (entry.package.created_at, entry.seq, entry.key().clone()))
                .collect();
            if by_age.len() > max_count {
                by_age.sort();
                let excess = by_age.len() - max_count;
                for (_, _, package_id) in by_age.into_iter().take(excess) {
                    if self.packages.remove(&package_id).is_some() {
                        evicted += 1;
                    }
                }
            }
        }

        debug!(evicted, remaining = self.packages.len(), "Package cleanup finished.");
        evicted
    }

    pub fn channel_statistics(&self) -> Vec<ChannelStatistics> {
        let mut stats: BTreeMap<String, ChannelStatistics> = BTreeMap::new();
        for entry in self.packages.iter() {
            let package = &entry.package;
            let stat = stats
                .entry(package.channel_id.clone())
                .or_insert_with(|| ChannelStatistics {
                    channel_id: package.channel_id.clone(),
                    channel_name: package.channel_name.clone(),
                    total: 0,
                    with_selection: 0,
                });
            stat.total += 1;
            if package.images.selected_index.is_some() {
                stat.with_selection += 1;
            }
        }
        stats.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn clear(&self) {
        self.packages.clear();
    }

    fn sorted(&self, keep: impl Fn(&Package) -> bool) -> Vec<Package> {
        let mut packages: Vec<(DateTime<Utc>, u64, Package)> = self
            .packages
            .iter()
            .filter(|entry| keep(&entry.package))
            .map(|entry| (entry.package.created_at, entry.seq, entry.package.clone()))
            .collect();
        packages.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        packages.into_iter().map(|(_, _, p)| p).collect()
    }
}
