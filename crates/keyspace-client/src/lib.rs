//! Keyspace client
//!
//! This crate provides the tenant-isolating store wrapper:
//! - Keyed command table and namespace rewriting
//! - Read-only state tracking with warning cooldown
//! - `NamespacedStore` with typed command families
//! - Bulk key enumeration and namespace-scoped deletion
//!
//! # Example
//! ```
//! # use std::sync::Arc;
//! # use keyspace_client::{NamespacedStore, ReadOnlyTracker};
//! # use keyspace_core::{MemoryBackend, StoreConfig, TaskTenant, TenantId};
//! # async fn example() -> keyspace_core::Result<()> {
//! let store = NamespacedStore::new(
//!     StoreConfig::default(),
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(TaskTenant),
//!     Arc::new(ReadOnlyTracker::new()),
//! );
//!
//! TaskTenant::with_tenant(TenantId::new("site_a")?, async {
//!     store.set("greeting", "hello").await?;
//!     assert_eq!(store.keys(None).await?, vec!["greeting"]);
//!     Ok::<_, keyspace_core::Error>(())
//! })
//! .await
//! # }
//! ```

mod bulk;
pub mod commands;
pub mod families;
pub mod proxy;
pub mod readonly;

pub use commands::{KEYED_COMMANDS, KeySpec};
pub use families::{SetCondition, SetOptions};
pub use proxy::NamespacedStore;
pub use readonly::{DEFAULT_READ_ONLY_COOLDOWN, ReadOnlyTracker, SharedReadOnlyTracker, StoreMode};
