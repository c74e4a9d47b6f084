//! Connection factory
//!
//! Turns a [`StoreConfig`] into a connected [`RedisBackend`]. There is no
//! retry loop here: a failure to connect is returned to the caller.

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use keyspace_core::{Result, StoreConfig};

use crate::backend::RedisBackend;

/// Connection URL for `config`, `redis://[:password@]host:port/db`
pub fn build_url(config: &StoreConfig) -> String {
    config.url()
}

/// Connection URL for `config` with the password masked
pub fn redacted_url(config: &StoreConfig) -> String {
    config.redacted_url()
}

/// Connection parameters for the `redis` client
///
/// The password is only sent when it is set and non-empty.
pub fn connection_info(config: &StoreConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password().map(str::to_string),
            ..Default::default()
        },
    }
}

/// Open a connection to the store described by `config`
///
/// # Errors
/// - `Error::Connection` if the client can't be created or the server can't
///   be reached
pub async fn raw_connection(config: &StoreConfig) -> Result<RedisBackend> {
    RedisBackend::connect(config).await
}
