//! Ephemeral key-value store for verification codes
//!
//! Entries carry an absolute expiry; an expired entry reads as absent and is
//! evicted on access.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::error::WalletError;

#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: TimeDelta) -> Result<(), WalletError>;

    /// The unexpired value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError>;

    async fn delete(&self, key: &str) -> Result<(), WalletError>;
}

#[derive(Debug, Clone)]
struct CodeEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// `DashMap`-backed code store
pub struct MemoryCodeStore {
    entries: DashMap<String, CodeEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn set(&self, key: &str, value: &str, ttl: TimeDelta) -> Result<(), WalletError> {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key.to_string(),
            CodeEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        let now = self.clock.now();
        let live = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), WalletError> {
        self.entries.remove(key);
        Ok(())
    }
}
