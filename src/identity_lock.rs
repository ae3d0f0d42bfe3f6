//! Serializes reconciliations that share an identity key.
//!
//! Lookup and write are two separate calls to Help Scout. Two identify events
//! for the same new email that interleave can both see "absent" and both
//! create a customer. A lock held across both calls closes that window for
//! callers in the same process; the default strategy takes no lock at all.

use async_trait::async_trait;
use moka::future::Cache;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockStrategy {
    /// No serialization; concurrent first-time identifies may create duplicates.
    #[default]
    None,
    /// In-process mutex per email.
    Keyed,
}

impl FromStr for LockStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(LockStrategy::None),
            "keyed" => Ok(LockStrategy::Keyed),
            other => anyhow::bail!("IDENTITY_LOCK must be 'none' or 'keyed', got '{}'", other),
        }
    }
}

/// Held for the duration of one reconciliation; releases on drop.
#[must_use]
pub struct IdentityGuard {
    _guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityGuard {
    fn unlocked() -> Self {
        Self { _guard: None }
    }
}

#[async_trait]
pub trait IdentityLock: Send + Sync {
    async fn acquire(&self, identity: &str) -> IdentityGuard;
}

pub struct NoIdentityLock;

#[async_trait]
impl IdentityLock for NoIdentityLock {
    async fn acquire(&self, _identity: &str) -> IdentityGuard {
        IdentityGuard::unlocked()
    }
}

/// One mutex per lower-cased email, kept while in use.
///
/// Entries idle for 5 minutes are dropped, far longer than a reconciliation
/// (two requests plus retries) can hold one.
pub struct KeyedIdentityLock {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl KeyedIdentityLock {
    pub fn new() -> Self {
        Self {
            locks: Cache::builder()
                .time_to_idle(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
        }
    }
}

impl Default for KeyedIdentityLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityLock for KeyedIdentityLock {
    async fn acquire(&self, identity: &str) -> IdentityGuard {
        let key = identity.trim().to_lowercase();
        let lock = self
            .locks
            .get_with(key, async { Arc::new(Mutex::new(())) })
            .await;

        IdentityGuard {
            _guard: Some(lock.lock_owned().await),
        }
    }
}

pub fn build_identity_lock(strategy: LockStrategy) -> Arc<dyn IdentityLock> {
    match strategy {
        LockStrategy::None => Arc::new(NoIdentityLock),
        LockStrategy::Keyed => Arc::new(KeyedIdentityLock::new()),
    }
}
