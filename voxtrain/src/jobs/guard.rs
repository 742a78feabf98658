//! Per-resource mutual exclusion with cached-handle invalidation.
//!
//! Every [`ResourceKey`] owns a lazily created entry: an async mutex that
//! serializes mutating jobs, a flag that is set while one is in flight, and
//! an optional cached handle (for example a loaded transcriber) built from
//! the resource under a separate loader lock. Starting a job through
//! [`ResourceGuard::begin_exclusive`] drops the cached handle before the job
//! body runs. Entries live for the whole
//! process; the key space is bounded by the configured models.
//!
//! # Example
//!
//! ```rust
//! use voxtrain::jobs::{ResourceGuard, ResourceKey};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let guard: ResourceGuard<String> = ResourceGuard::new();
//! let key = ResourceKey::train("en-test");
//!
//! let scope = guard.begin_exclusive(key.clone()).await;
//! assert!(guard.try_begin_exclusive(key.clone()).await.is_err());
//! drop(scope);
//! assert!(guard.try_begin_exclusive(key).await.is_ok());
//! # }
//! ```

use super::ResourceKey;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Errors raised by the resource guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// A job for the key is already running.
    #[error("A {} job is already running for {}", .0.kind, .0.id)]
    Busy(ResourceKey),
}

struct Entry<H> {
    /// Serializes jobs.
    exclusive: Arc<AsyncMutex<()>>,
    /// Set for the lifetime of an [`ExclusiveScope`].
    running: Arc<AtomicBool>,
    /// Serializes loads and cache mutation.
    loading: AsyncMutex<()>,
    handle: RwLock<Option<Arc<H>>>,
}

impl<H> Entry<H> {
    fn new() -> Self {
        Self {
            exclusive: Arc::new(AsyncMutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
            loading: AsyncMutex::new(()),
            handle: RwLock::new(None),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Table of per-key critical sections and cached handles.
///
/// Owned by the application state and shared by reference; keys never block
/// each other.
pub struct ResourceGuard<H> {
    entries: Mutex<HashMap<ResourceKey, Arc<Entry<H>>>>,
}

impl<H> Default for ResourceGuard<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> std::fmt::Debug for ResourceGuard<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("keys", &self.entries.lock().len())
            .finish()
    }
}

impl<H> ResourceGuard<H> {
    /// Create an empty guard table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &ResourceKey) -> Arc<Entry<H>> {
        let mut entries = self.entries.lock();
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Entry::new())),
        )
    }

    /// Acquire exclusive access to `key`, waiting behind any running job.
    ///
    /// The cached handle for `key` is dropped before this returns.
    pub async fn begin_exclusive(&self, key: ResourceKey) -> ExclusiveScope {
        let entry = self.entry(&key);
        let permit = if let Ok(permit) = Arc::clone(&entry.exclusive).try_lock_owned() {
            permit
        } else {
            debug!(key = %key, "Waiting for running job to release resource");
            Arc::clone(&entry.exclusive).lock_owned().await
        };

        Self::enter(key, &entry, permit).await
    }

    /// Acquire exclusive access to `key` without queueing behind another job.
    ///
    /// A handle load already in progress for `key` is allowed to finish
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Busy`] if a job already holds `key`.
    pub async fn try_begin_exclusive(
        &self,
        key: ResourceKey,
    ) -> Result<ExclusiveScope, GuardError> {
        let entry = self.entry(&key);
        let Ok(permit) = Arc::clone(&entry.exclusive).try_lock_owned() else {
            return Err(GuardError::Busy(key));
        };

        Ok(Self::enter(key, &entry, permit).await)
    }

    async fn enter(
        key: ResourceKey,
        entry: &Entry<H>,
        permit: OwnedMutexGuard<()>,
    ) -> ExclusiveScope {
        // Loads starting from here are refused; one already running finishes
        // before the handle is dropped.
        entry.running.store(true, Ordering::Release);
        let scope = ExclusiveScope::new(key, Arc::clone(&entry.running), permit);

        let _loading = entry.loading.lock().await;
        if entry.handle.write().take().is_some() {
            info!(key = %scope.key, "Invalidated cached handle");
        }
        scope
    }

    /// Cached handle for `key`, if one is loaded.
    #[must_use]
    pub fn cached(&self, key: &ResourceKey) -> Option<Arc<H>> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        let handle = entry.handle.read().clone();
        handle
    }

    /// Return the cached handle for `key`, building it with `load` if absent.
    ///
    /// Concurrent callers for the same key wait for one another, so a handle
    /// is built at most once. A job cannot start mutating the resource while
    /// a load is running.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Busy`] (converted into `E`) while a job holds
    /// `key`, or whatever `load` fails with.
    pub async fn get_or_load<E, F, Fut>(&self, key: &ResourceKey, load: F) -> Result<Arc<H>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H, E>>,
        E: From<GuardError>,
    {
        let entry = self.entry(key);
        if entry.is_running() {
            return Err(GuardError::Busy(key.clone()).into());
        }

        let _loading = entry.loading.lock().await;
        if entry.is_running() {
            return Err(GuardError::Busy(key.clone()).into());
        }

        let cached = entry.handle.read().clone();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let handle = Arc::new(load().await?);
        *entry.handle.write() = Some(Arc::clone(&handle));
        debug!(key = %key, "Cached new handle");
        Ok(handle)
    }

    /// Replace the cached handle for `key` with `update(current)`.
    ///
    /// Does nothing when no handle is cached. Returns whether a handle was
    /// replaced.
    pub async fn update_cached<F>(&self, key: &ResourceKey, update: F) -> bool
    where
        F: FnOnce(&H) -> H,
    {
        let entry = self.entry(key);
        let _loading = entry.loading.lock().await;

        let mut handle = entry.handle.write();
        let Some(current) = handle.as_deref() else {
            return false;
        };
        let updated = Arc::new(update(current));
        *handle = Some(updated);
        debug!(key = %key, "Updated cached handle");
        true
    }

    /// Whether a job currently holds `key`.
    #[must_use]
    pub fn is_held(&self, key: &ResourceKey) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|entry| entry.is_running())
    }
}

/// Proof of exclusive access to a resource key.
///
/// Dropping the scope (on any exit path, including unwinding) frees the key.
#[derive(Debug)]
#[must_use = "the resource is released as soon as the scope is dropped"]
pub struct ExclusiveScope {
    key: ResourceKey,
    acquired: Instant,
    running: Arc<AtomicBool>,
    _permit: OwnedMutexGuard<()>,
}

impl ExclusiveScope {
    fn new(key: ResourceKey, running: Arc<AtomicBool>, permit: OwnedMutexGuard<()>) -> Self {
        debug!(key = %key, "Acquired exclusive resource");
        Self {
            key,
            acquired: Instant::now(),
            running,
            _permit: permit,
        }
    }

    /// Key this scope holds.
    #[must_use]
    pub const fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl Drop for ExclusiveScope {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        debug!(
            key = %self.key,
            held_ms = u64::try_from(self.acquired.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Released exclusive resource"
        );
    }
}
