//! `StoreBackend` implementation over a Redis connection manager

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, ErrorKind, RedisError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use keyspace_core::{
    Command, Error, Result, StoreBackend, StoreConfig, StoreError, StoreErrorKind, Value,
};

use crate::factory::connection_info;

/// Redis-backed store client
///
/// The connection manager multiplexes commands over one connection and
/// reconnects on its own after a dropped connection. `reconnect` replaces it
/// with a freshly established one.
pub struct RedisBackend {
    client: Client,
    manager: RwLock<ConnectionManager>,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    url: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to the store described by `config`
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.redacted_url();
        let client = Client::open(connection_info(config)).map_err(|e| {
            error!("Invalid store connection settings for {}: {}", url, e);
            Error::Connection(format!("{}: {}", url, e))
        })?;

        let connect_timeout = config.connect_timeout();
        let response_timeout = config.response_timeout();
        let manager = open_manager(&client, connect_timeout, response_timeout, &url).await?;

        info!("Connected to key-value store at {}", url);
        Ok(Self {
            client,
            manager: RwLock::new(manager),
            connect_timeout,
            response_timeout,
            url,
        })
    }

    /// The connection URL with the password masked
    pub fn redacted_url(&self) -> &str {
        &self.url
    }
}

async fn open_manager(
    client: &Client,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    url: &str,
) -> Result<ConnectionManager> {
    let mut manager_config = ConnectionManagerConfig::new();
    if let Some(timeout) = connect_timeout {
        manager_config = manager_config.set_connection_timeout(timeout);
    }
    if let Some(timeout) = response_timeout {
        manager_config = manager_config.set_response_timeout(timeout);
    }

    client
        .get_connection_manager_with_config(manager_config)
        .await
        .map_err(|e| {
            error!("Failed to connect to key-value store at {}: {}", url, e);
            Error::Connection(format!("{}: {}", url, e))
        })
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn execute(&self, command: &Command) -> Result<Value> {
        let mut connection = self.manager.read().await.clone();

        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            cmd.arg(arg.as_bytes());
        }

        let reply: redis::Value = cmd
            .query_async(&mut connection)
            .await
            .map_err(map_error)?;
        convert_value(command.name(), reply)
    }

    async fn reconnect(&self) -> Result<()> {
        debug!("Reconnecting to key-value store at {}", self.url);
        let manager = open_manager(
            &self.client,
            self.connect_timeout,
            self.response_timeout,
            &self.url,
        )
        .await?;
        *self.manager.write().await = manager;
        info!("Reconnected to key-value store at {}", self.url);
        Ok(())
    }
}

/// Classify a `redis` error
fn map_error(err: RedisError) -> Error {
    let kind = match err.kind() {
        ErrorKind::ReadOnly => StoreErrorKind::ReadOnly,
        ErrorKind::AuthenticationFailed => StoreErrorKind::Auth,
        ErrorKind::TypeError => StoreErrorKind::Protocol,
        _ if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal() =>
        {
            StoreErrorKind::Connection
        }
        ErrorKind::ResponseError | ErrorKind::ExecAbortError => StoreErrorKind::Response,
        _ => StoreErrorKind::Other,
    };
    Error::Store(StoreError::new(kind, err.to_string()))
}

/// Convert a `redis` reply, flattening maps into alternating arrays
fn convert_value(command: &str, value: redis::Value) -> Result<Value> {
    let converted = match value {
        redis::Value::Nil => Value::Nil,
        redis::Value::Int(n) => Value::Int(n),
        redis::Value::BulkString(bytes) => Value::Data(bytes),
        redis::Value::SimpleString(status) => Value::Status(status),
        redis::Value::Okay => Value::Okay,
        redis::Value::Double(d) => Value::Double(d),
        redis::Value::Boolean(b) => Value::Boolean(b),
        redis::Value::VerbatimString { text, .. } => Value::Data(text.into_bytes()),
        redis::Value::Array(items) | redis::Value::Set(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert_value(command, item))
                .collect::<Result<_>>()?,
        ),
        redis::Value::Map(pairs) => {
            let mut flat = Vec::with_capacity(pairs.len() * 2);
            for (k, v) in pairs {
                flat.push(convert_value(command, k)?);
                flat.push(convert_value(command, v)?);
            }
            Value::Array(flat)
        }
        redis::Value::Attribute { data, .. } => convert_value(command, *data)?,
        other => {
            return Err(Error::UnexpectedReply {
                command: command.to_string(),
                reason: format!("unsupported reply {:?}", other),
            });
        }
    };
    Ok(converted)
}
