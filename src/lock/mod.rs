//! Distributed lock provider interface and an in-process implementation.
//!
//! A single well-known lock gates the whole migration run so that
//! concurrent processes serialise; index creation is gated independently
//! under a per-index key. The provider contract is a scoped
//! acquire/run/release primitive, rendered here as an RAII guard: dropping
//! the returned [`LockGuard`] releases the lease.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Error types for lock provider operations.
///
/// Contention is not an error: a contended acquisition returns
/// `Ok(None)` from [`LockProvider::try_acquire`]. This covers failures of
/// the provider itself (e.g. the backing store is unreachable).
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock provider error: {0}")]
    Provider(String),
}

/// Held lease on a named lock. Dropping the guard releases the lock.
pub struct LockGuard {
    _lease: Box<dyn Any + Send>,
}

impl LockGuard {
    /// Wrap a provider-specific lease object.
    pub fn new(lease: impl Any + Send) -> Self {
        Self {
            _lease: Box::new(lease),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Provider of named, mutually exclusive locks.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try to acquire the lock named `key`, waiting up to `acquire_timeout`.
    ///
    /// Returns `Ok(None)` if the lock could not be acquired within the
    /// timeout. `lease_timeout` is the upper bound a distributed
    /// implementation keeps the lease alive if the holder disappears;
    /// exceeding it mid-run is an operator problem, the lock is never
    /// preempted from under a live holder.
    async fn try_acquire(
        &self,
        key: &str,
        acquire_timeout: Duration,
        lease_timeout: Duration,
    ) -> Result<Option<LockGuard>, LockError>;
}

/// In-process lock provider backed by named `tokio` mutexes.
///
/// Suitable for single-process deployments and tests. Leases last until
/// the guard is dropped; `lease_timeout` is ignored because an in-process
/// holder cannot disappear without dropping its guard.
#[derive(Default)]
pub struct LocalLockProvider {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn try_acquire(
        &self,
        key: &str,
        acquire_timeout: Duration,
        _lease_timeout: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        let mutex = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        match tokio::time::timeout(acquire_timeout, mutex.lock_owned()).await {
            Ok(lease) => Ok(Some(LockGuard::new(lease))),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);
    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_acquire_uncontended() {
        let provider = LocalLockProvider::new();
        let guard = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error");
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn test_contended_acquire_returns_none() {
        let provider = LocalLockProvider::new();
        let _held = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error")
            .expect("Should acquire");

        let second = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error");
        assert!(second.is_none(), "Held lock should not be re-acquired");
    }

    #[tokio::test]
    async fn test_dropping_guard_releases_lock() {
        let provider = LocalLockProvider::new();
        let held = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error")
            .expect("Should acquire");
        drop(held);

        let second = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error");
        assert!(second.is_some(), "Released lock should be acquirable");
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let provider = LocalLockProvider::new();
        let _held = provider
            .try_acquire("migrations", SHORT, LEASE)
            .await
            .expect("Should not error")
            .expect("Should acquire");

        let other = provider
            .try_acquire("create-index:migrations", SHORT, LEASE)
            .await
            .expect("Should not error");
        assert!(other.is_some(), "Different key should be acquirable");
    }
}
