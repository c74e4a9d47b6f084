//! Read-Only State Tracker
//!
//! Records when the store last rejected a command because it is read-only
//! (a replica, or a primary mid-failover), so that callers degrade to the
//! nil reading instead of failing, and so the warning is logged at most once
//! per cooldown window.
//!
//! States:
//! - Normal: no rejection seen within the cooldown window
//! - ReadOnly: a rejection was seen within the cooldown window
//!
//! State transitions:
//! - Normal → ReadOnly: on any read-only rejection
//! - ReadOnly → Normal: when the cooldown expires, or on `clear_read_only`
//!
//! The state only affects logging. Commands are always sent to the store.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

use keyspace_core::Result;

/// How long a read-only rejection suppresses further warnings
pub const DEFAULT_READ_ONLY_COOLDOWN: Duration = Duration::from_secs(15);

/// Observed store mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// No recent read-only rejection
    Normal,
    /// A read-only rejection was seen within the cooldown window
    ReadOnly,
}

/// Shared record of the last read-only rejection
///
/// Build one per process and hand the same `Arc` to every store.
#[derive(Debug)]
pub struct ReadOnlyTracker {
    /// When the last rejection was recorded
    last_read_only: Mutex<Option<Instant>>,
    cooldown: Duration,
    warnings_emitted: AtomicU64,
}

impl Default for ReadOnlyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadOnlyTracker {
    /// Create a tracker with the default cooldown
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_READ_ONLY_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            last_read_only: Mutex::new(None),
            cooldown,
            warnings_emitted: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_read_only
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a rejection was recorded within the cooldown window
    pub fn is_recently_read_only(&self) -> bool {
        self.slot()
            .is_some_and(|at| at.elapsed() < self.cooldown)
    }

    /// Record a rejection now
    pub fn record_read_only(&self) {
        *self.slot() = Some(Instant::now());
    }

    /// Forget any recorded rejection
    pub fn clear_read_only(&self) {
        *self.slot() = None;
    }

    /// Time since the last recorded rejection
    pub fn last_read_only(&self) -> Option<Duration> {
        self.slot().map(|at| at.elapsed())
    }

    /// Number of read-only warnings logged so far
    pub fn warnings_emitted(&self) -> u64 {
        self.warnings_emitted.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> StoreMode {
        if self.is_recently_read_only() {
            StoreMode::ReadOnly
        } else {
            StoreMode::Normal
        }
    }

    /// Record a rejection, returning whether it should be logged
    fn note_rejection(&self) -> bool {
        let mut last = self.slot();
        let recently = last.is_some_and(|at| at.elapsed() < self.cooldown);
        *last = Some(Instant::now());
        !recently
    }

    /// Run a store operation, absorbing read-only rejections
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the store
    /// rejected the command as read-only. Every other error is returned
    /// unchanged.
    pub async fn guard<T, F>(&self, command: &str, operation: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match operation.await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_read_only() => {
                if self.note_rejection() {
                    self.warnings_emitted.fetch_add(1, Ordering::AcqRel);
                    warn!(
                        command,
                        error = %err,
                        "Key-value store is read-only, command skipped"
                    );
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Tracker shared by every store built from the same bootstrap
pub type SharedReadOnlyTracker = Arc<ReadOnlyTracker>;
