pub mod channel_registry;
pub mod package_store;

pub use channel_registry::{ChannelRegistry, RegistryError};
pub use package_store::{CleanupPolicy, PackageStore, PackageStoreError};
