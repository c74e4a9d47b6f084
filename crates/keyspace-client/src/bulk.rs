//! Bulk operations over the current namespace
//!
//! Enumeration uses KEYS, so these are meant for maintenance paths rather
//! than hot request paths. Deletion is key by key and not atomic.

use tracing::{debug, info};

use keyspace_core::{Command, Result, TenantId};

use crate::proxy::NamespacedStore;

impl NamespacedStore {
    /// Delete one key; returns how many keys were removed
    pub async fn del(&self, key: &str) -> Result<u64> {
        self.run(Command::new("DEL").arg(key)).await
    }

    /// Keys of the current namespace matching `pattern` (default `*`)
    ///
    /// The namespace prefix is stripped from the returned keys.
    pub async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let tenant = self.namespace()?;
        self.keys_in(&tenant, pattern).await
    }

    async fn keys_in(&self, tenant: &TenantId, pattern: Option<&str>) -> Result<Vec<String>> {
        let command = Command::new("KEYS").arg(tenant.qualify(pattern.unwrap_or("*")));
        let stored: Vec<String> = self.send(command).await?;
        Ok(stored
            .iter()
            .filter_map(|key| tenant.strip(key))
            .map(str::to_string)
            .collect())
    }

    async fn delete_all(&self, tenant: &TenantId, keys: Vec<String>) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            let deleted: u64 = self
                .send(Command::new("DEL").arg(tenant.qualify(&key)))
                .await?;
            removed += deleted;
        }
        Ok(removed)
    }

    /// Delete every key of the current namespace starting with `prefix`
    pub async fn delete_prefixed(&self, prefix: &str) -> Result<u64> {
        let tenant = self.namespace()?;
        let keys = self.keys_in(&tenant, Some(&format!("{}*", prefix))).await?;
        debug!(namespace = %tenant, prefix, count = keys.len(), "Deleting prefixed keys");
        self.delete_all(&tenant, keys).await
    }

    /// Delete every key of the current namespace
    ///
    /// Other namespaces are untouched; FLUSHDB is never sent.
    pub async fn flush_namespace(&self) -> Result<u64> {
        let tenant = self.namespace()?;
        let keys = self.keys_in(&tenant, None).await?;
        let removed = self.delete_all(&tenant, keys).await?;
        info!(namespace = %tenant, removed, "Flushed namespace");
        Ok(removed)
    }

    /// Re-establish the backend connection
    pub async fn reconnect(&self) -> Result<()> {
        self.without_namespace().reconnect().await?;
        info!("Reconnected store {}", self.config().redacted_url());
        Ok(())
    }
}
