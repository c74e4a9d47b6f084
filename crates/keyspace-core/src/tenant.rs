//! Tenant types and namespace resolution for multi-tenancy support

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Error, Result};

/// Separator between the namespace and the caller's key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Characters a tenant identifier may not contain.
///
/// The separator would let one tenant's prefix collide with another's
/// (`a` + `b:x` vs `a:b` + `x`), and glob metacharacters would turn a
/// namespace into a pattern when keys are enumerated.
const FORBIDDEN_CHARS: &[char] = &[NAMESPACE_SEPARATOR, '*', '?', '[', ']', '\\'];

/// Identifier of the tenant whose keys are being accessed.
///
/// Every key written through a namespaced store is stored as
/// `"{tenant}:{key}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant ID, validating that it is usable as a key prefix
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidTenant("tenant ID is empty".to_string()));
        }
        if let Some(c) = id.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(Error::InvalidTenant(format!(
                "tenant ID '{}' contains forbidden character '{}'",
                id, c
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the `"{tenant}:"` prefix, in bytes
    pub fn prefix_len(&self) -> usize {
        self.0.len() + NAMESPACE_SEPARATOR.len_utf8()
    }

    /// Qualify a caller key with this namespace
    pub fn qualify(&self, key: &str) -> String {
        let mut qualified = String::with_capacity(self.prefix_len() + key.len());
        qualified.push_str(&self.0);
        qualified.push(NAMESPACE_SEPARATOR);
        qualified.push_str(key);
        qualified
    }

    /// Strip this namespace from a stored key.
    ///
    /// Returns `None` when the key belongs to another namespace.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.0.as_str())?
            .strip_prefix(NAMESPACE_SEPARATOR)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Source of the namespace for the command currently being issued.
///
/// Resolved on every command, never cached by the store wrapper, because a
/// worker may serve several tenants over its lifetime.
pub trait NamespaceResolver: Send + Sync {
    /// Get the active namespace
    ///
    /// # Errors
    /// - `Error::TenantRequired` if no tenant is active
    fn current_namespace(&self) -> Result<TenantId>;
}

/// Resolver that always yields the same namespace.
///
/// Used by single-tenant deployments and operator tooling.
#[derive(Debug, Clone)]
pub struct StaticNamespace(TenantId);

impl StaticNamespace {
    pub fn new(tenant: TenantId) -> Self {
        Self(tenant)
    }
}

impl NamespaceResolver for StaticNamespace {
    fn current_namespace(&self) -> Result<TenantId> {
        Ok(self.0.clone())
    }
}

/// Explicitly managed tenant context.
///
/// Cloning shares the underlying slot, so a request handler can hold one
/// handle while stores built from another handle observe the change.
///
/// # Example
/// ```
/// # use keyspace_core::tenant::{NamespaceResolver, TenantContext, TenantId};
/// let context = TenantContext::new();
/// {
///     let _guard = context.enter(TenantId::new("site_a").unwrap());
///     assert_eq!(context.current_namespace().unwrap().as_str(), "site_a");
/// }
/// assert!(context.get().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    current: Arc<RwLock<Option<TenantId>>>,
}

impl TenantContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `tenant` the active tenant
    pub fn set(&self, tenant: TenantId) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(tenant);
    }

    /// Get the active tenant, if any
    pub fn get(&self) -> Option<TenantId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove the active tenant
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Activate `tenant` until the returned guard is dropped.
    ///
    /// The previously active tenant (or none) is restored on drop, including
    /// during unwinding.
    pub fn enter(&self, tenant: TenantId) -> TenantGuard {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tenant);
        TenantGuard {
            context: self.clone(),
            previous,
        }
    }
}

impl NamespaceResolver for TenantContext {
    fn current_namespace(&self) -> Result<TenantId> {
        self.get()
            .ok_or_else(|| Error::TenantRequired("no tenant is active in this context".to_string()))
    }
}

/// Restores the previous tenant of a [`TenantContext`] when dropped.
#[must_use = "the tenant is deactivated as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TenantGuard {
    context: TenantContext,
    previous: Option<TenantId>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        *self
            .context
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.previous.take();
    }
}

tokio::task_local! {
    static CURRENT_TENANT: TenantId;
}

/// Resolver backed by a tokio task-local.
///
/// The tenant is only visible inside [`TaskTenant::with_tenant`], so it cannot leak
/// into the next task a worker thread picks up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskTenant;

impl TaskTenant {
    /// Run `future` with `tenant` as the active tenant
    pub async fn with_tenant<F: Future>(tenant: TenantId, future: F) -> F::Output {
        CURRENT_TENANT.scope(tenant, future).await
    }

    /// Run a synchronous closure with `tenant` as the active tenant
    pub fn sync_scope<R>(tenant: TenantId, f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(tenant, f)
    }

    /// Get the tenant of the current task, if any
    pub fn current() -> Option<TenantId> {
        CURRENT_TENANT.try_with(|tenant| tenant.clone()).ok()
    }
}

impl NamespaceResolver for TaskTenant {
    fn current_namespace(&self) -> Result<TenantId> {
        Self::current()
            .ok_or_else(|| Error::TenantRequired("no tenant is scoped to this task".to_string()))
    }
}
