//! Keyspace Core Types and Traits
//!
//! This crate provides the fundamental types shared by the keyspace crates:
//! - Store configuration
//! - Tenant identifiers and namespace resolution
//! - The `StoreBackend` abstraction over a key-value client
//! - Core error types

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod tenant;

pub use backend::{Arg, Command, FromValue, StoreBackend, Value};
pub use config::StoreConfig;
pub use error::{Error, Result, StoreError, StoreErrorKind};
pub use memory::MemoryBackend;
pub use tenant::{NamespaceResolver, StaticNamespace, TaskTenant, TenantContext, TenantGuard, TenantId};
