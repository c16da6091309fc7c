//! Locks - Named mutexes serializing conflicting remote mutations
//!
//! The control plane often stores a list of children as one array on the
//! parent (subnets on a virtual network, rules on a security group). Two
//! concurrent read-modify-write sequences against the same parent silently
//! drop one child, so every operation that mutates a shared parent first
//! takes the named lock for that parent.
//!
//! Locks are keyed by `(resource_type, name)` so a virtual network and a
//! storage account that share a name never contend. Entries are created on
//! first use and live as long as the registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Composite key of a named lock
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    /// Resource type discriminator (e.g., "virtual_network")
    pub resource_type: String,
    /// Logical resource name
    pub name: String,
}

impl LockKey {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Registry of named locks shared by concurrently running operations
///
/// Cloning is cheap and clones share the same locks.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    // Guards insertion only; never held across an await.
    locks: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &LockKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait until the lock for `(resource_type, name)` is free and take it
    ///
    /// The lock is held until the returned guard is dropped or released.
    pub async fn acquire(&self, name: &str, resource_type: &str) -> NamedLockGuard {
        let key = LockKey::new(resource_type, name);
        let mutex = self.entry(&key);

        let guard = match mutex.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                log::debug!("waiting for lock {}", key);
                mutex.lock_owned().await
            }
        };
        log::debug!("acquired lock {}", key);

        NamedLockGuard { key, _guard: guard }
    }

    /// Take the locks for several names of the same resource type
    ///
    /// Names are sorted and de-duplicated first, so two callers locking
    /// overlapping sets always acquire in the same order.
    pub async fn acquire_multiple<S: AsRef<str>>(
        &self,
        names: &[S],
        resource_type: &str,
    ) -> MultiLockGuard {
        let mut sorted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for name in sorted {
            guards.push(self.acquire(name, resource_type).await);
        }
        MultiLockGuard { guards }
    }

    /// Run `operation` while holding the lock, returning its output unchanged
    pub async fn with_lock<F, T>(&self, name: &str, resource_type: &str, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.acquire(name, resource_type).await;
        operation.await
    }

    /// Number of keys ever locked through this registry
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A held named lock, released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct NamedLockGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Release the lock now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        log::debug!("released lock {}", self.key);
    }
}

impl fmt::Debug for NamedLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLockGuard")
            .field("key", &self.key)
            .finish()
    }
}

/// Several held named locks, released in reverse acquisition order
#[must_use = "the locks are released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MultiLockGuard {
    guards: Vec<NamedLockGuard>,
}

impl MultiLockGuard {
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> + '_ {
        self.guards.iter().map(NamedLockGuard::key)
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Release every lock now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for MultiLockGuard {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}
