//! Redis backend for keyspace
//!
//! This crate connects a [`StoreConfig`](keyspace_core::StoreConfig) to a
//! Redis server and exposes the connection as a
//! [`StoreBackend`](keyspace_core::StoreBackend).
//!
//! # Features
//! - Connection URL building (password only when set)
//! - Auto-reconnecting `ConnectionManager` with optional timeouts
//! - Mapping of Redis errors and replies onto keyspace types
//!
//! # Example
//! ```no_run
//! # use keyspace_core::{StoreBackend, StoreConfig, Command};
//! # async fn example() -> keyspace_core::Result<()> {
//! let config = StoreConfig::new().with_host("cache.internal").with_db(2);
//! let backend = keyspace_redis::raw_connection(&config).await?;
//! backend.execute(&Command::new("PING")).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod factory;

pub use backend::RedisBackend;
pub use factory::{build_url, connection_info, raw_connection, redacted_url};
