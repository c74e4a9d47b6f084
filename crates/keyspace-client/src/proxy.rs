//! Namespaced command proxy
//!
//! `NamespacedStore` forwards commands to a [`StoreBackend`] after prefixing
//! their key arguments with the active tenant's namespace, and runs every
//! command through the [`ReadOnlyTracker`] guard.

use std::sync::Arc;
use tracing::debug;

use keyspace_core::{
    Arg, Command, Error, FromValue, NamespaceResolver, Result, StoreBackend, StoreConfig,
    TenantId, Value,
};

use crate::commands;
use crate::readonly::ReadOnlyTracker;

/// Tenant-isolating, read-only-tolerant store client
///
/// The namespace is resolved on every command. A store holds no other
/// per-call state, so one instance can serve many tenants concurrently.
pub struct NamespacedStore {
    config: StoreConfig,
    backend: Arc<dyn StoreBackend>,
    resolver: Arc<dyn NamespaceResolver>,
    tracker: Arc<ReadOnlyTracker>,
}

impl std::fmt::Debug for NamespacedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedStore")
            .field("url", &self.config.redacted_url())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl NamespacedStore {
    pub fn new(
        config: StoreConfig,
        backend: Arc<dyn StoreBackend>,
        resolver: Arc<dyn NamespaceResolver>,
        tracker: Arc<ReadOnlyTracker>,
    ) -> Self {
        Self {
            config,
            backend,
            resolver,
            tracker,
        }
    }

    /// Connect to Redis and wrap the connection
    ///
    /// # Errors
    /// - `Error::Connection` if the server can't be reached
    pub async fn connect(
        config: StoreConfig,
        resolver: Arc<dyn NamespaceResolver>,
        tracker: Arc<ReadOnlyTracker>,
    ) -> Result<Self> {
        let backend = keyspace_redis::raw_connection(&config).await?;
        Ok(Self::new(config, Arc::new(backend), resolver, tracker))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Connection URL of the underlying store
    pub fn url(&self) -> String {
        self.config.url()
    }

    pub fn tracker(&self) -> &Arc<ReadOnlyTracker> {
        &self.tracker
    }

    /// The namespace commands would be issued under right now
    pub fn namespace(&self) -> Result<TenantId> {
        self.resolver.current_namespace()
    }

    /// The raw backend, for data shared by every tenant
    ///
    /// Commands sent here are neither namespaced nor guarded.
    pub fn without_namespace(&self) -> Arc<dyn StoreBackend> {
        Arc::clone(&self.backend)
    }

    /// Send an arbitrary command
    ///
    /// Keys of commands in [`commands::KEYED_COMMANDS`] are namespaced, other
    /// commands are forwarded as given. A read-only rejection yields
    /// `Value::Nil`.
    pub async fn execute(&self, name: &str, args: Vec<Arg>) -> Result<Value> {
        self.run(Command::with_args(name, args)).await
    }

    /// Namespace, send and decode one command
    pub(crate) async fn run<T: FromValue>(&self, mut command: Command) -> Result<T> {
        if commands::key_spec(command.name()).is_some() {
            let tenant = self.namespace()?;
            commands::namespace_command(&mut command, &tenant);
            debug!(command = command.name(), namespace = %tenant, "Sending keyed command");
        } else {
            debug!(command = command.name(), "Sending command");
        }

        self.send(command).await
    }

    /// Send an already namespaced command
    pub(crate) async fn send<T: FromValue>(&self, command: Command) -> Result<T> {
        let reply = self
            .tracker
            .guard(command.name(), self.backend.execute(&command))
            .await?
            .unwrap_or(Value::Nil);

        T::from_value(reply).map_err(|reason| Error::UnexpectedReply {
            command: command.name().to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keyspace_core::{StaticNamespace, StoreError, StoreErrorKind, TenantContext};
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Backend {}

        #[async_trait]
        impl StoreBackend for Backend {
            async fn execute(&self, command: &Command) -> Result<Value>;
            async fn reconnect(&self) -> Result<()>;
        }
    }

    fn store_with(backend: MockBackend, tenant: &str) -> NamespacedStore {
        NamespacedStore::new(
            StoreConfig::default(),
            Arc::new(backend),
            Arc::new(StaticNamespace::new(TenantId::new(tenant).unwrap())),
            Arc::new(ReadOnlyTracker::new()),
        )
    }

    #[tokio::test]
    async fn test_keyed_command_is_prefixed() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .with(eq(Command::new("GET").arg("site_a:foo")))
            .times(1)
            .returning(|_| Ok(Value::from("bar")));

        let store = store_with(backend, "site_a");
        let value = store.execute("get", vec!["foo".into()]).await.unwrap();
        assert_eq!(value, Value::from("bar"));
    }

    #[tokio::test]
    async fn test_sort_destination_and_patterns_are_prefixed() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .with(eq(Command::new("SORT")
                .arg("site_a:list")
                .arg("BY")
                .arg("site_a:w_*")
                .arg("STORE")
                .arg("site_a:dst")))
            .times(1)
            .returning(|_| Ok(Value::Int(3)));

        let store = store_with(backend, "site_a");
        let value = store
            .execute(
                "SORT",
                vec!["list".into(), "BY".into(), "w_*".into(), "STORE".into(), "dst".into()],
            )
            .await
            .unwrap();
        assert_eq!(value, Value::Int(3));
    }

    #[tokio::test]
    async fn test_unkeyed_command_is_forwarded_as_is() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .with(eq(Command::new("PING")))
            .times(1)
            .returning(|_| Ok(Value::Status("PONG".to_string())));

        let store = store_with(backend, "site_a");
        let value = store.execute("PING", vec![]).await.unwrap();
        assert_eq!(value, Value::Status("PONG".to_string()));
    }

    #[tokio::test]
    async fn test_read_only_rejection_becomes_nil() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .times(2)
            .returning(|_| Err(Error::Store(StoreError::read_only())));

        let store = store_with(backend, "site_a");
        let value = store
            .execute("SET", vec!["x".into(), "y".into()])
            .await
            .unwrap();
        assert_eq!(value, Value::Nil);
        store
            .execute("SET", vec!["x".into(), "y".into()])
            .await
            .unwrap();
        assert_eq!(store.tracker().warnings_emitted(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let mut backend = MockBackend::new();
        backend.expect_execute().times(1).returning(|_| {
            Err(Error::Store(StoreError::new(
                StoreErrorKind::Response,
                "WRONGTYPE Operation against a key holding the wrong kind of value",
            )))
        });

        let store = store_with(backend, "site_a");
        let result = store.execute("LPUSH", vec!["k".into(), "v".into()]).await;
        assert!(matches!(result, Err(Error::Store(e)) if e.message.starts_with("WRONGTYPE")));
        assert!(!store.tracker().is_recently_read_only());
    }

    #[tokio::test]
    async fn test_missing_tenant_is_an_error() {
        let mut backend = MockBackend::new();
        backend.expect_execute().times(0);

        let store = NamespacedStore::new(
            StoreConfig::default(),
            Arc::new(backend),
            Arc::new(TenantContext::new()),
            Arc::new(ReadOnlyTracker::new()),
        );
        let result = store.execute("GET", vec!["foo".into()]).await;
        assert!(matches!(result, Err(Error::TenantRequired(_))));
    }

    #[tokio::test]
    async fn test_namespace_resolved_per_command() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .with(eq(Command::new("GET").arg("site_a:k")))
            .times(1)
            .returning(|_| Ok(Value::Nil));
        backend
            .expect_execute()
            .with(eq(Command::new("GET").arg("site_b:k")))
            .times(1)
            .returning(|_| Ok(Value::Nil));

        let context = TenantContext::new();
        let store = NamespacedStore::new(
            StoreConfig::default(),
            Arc::new(backend),
            Arc::new(context.clone()),
            Arc::new(ReadOnlyTracker::new()),
        );

        {
            let _guard = context.enter(TenantId::new("site_a").unwrap());
            store.execute("GET", vec!["k".into()]).await.unwrap();
        }
        {
            let _guard = context.enter(TenantId::new("site_b").unwrap());
            store.execute("GET", vec!["k".into()]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_undecodable_reply() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .returning(|_| Ok(Value::from("not-a-number")));

        let store = store_with(backend, "site_a");
        let result: Result<i64> = store.run(Command::new("INCR").arg("n")).await;
        assert!(matches!(result, Err(Error::UnexpectedReply { command, .. }) if command == "INCR"));
    }

    #[test]
    fn test_url_and_without_namespace() {
        let backend = MockBackend::new();
        let store = NamespacedStore::new(
            StoreConfig::new().with_host("cache").with_password("pw"),
            Arc::new(backend),
            Arc::new(TenantContext::new()),
            Arc::new(ReadOnlyTracker::new()),
        );
        assert_eq!(store.url(), "redis://:pw@cache:6379/0");
        assert_eq!(Arc::strong_count(&store.without_namespace()), 2);
    }
}
