//! In-memory grant store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{PermissionInfo, PermissionStore, StoreError};

/// Grant store backed by a process-local map.
///
/// Records are cleared when the process exits. The store is safe under
/// interleaved asynchronous tasks; it makes no stronger cross-thread
/// ordering promises than its lock provides.
pub struct MemoryPermissionStore {
    grants: RwLock<HashMap<String, PermissionInfo>>,
}

impl MemoryPermissionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently held, including not-yet-evicted expired
    /// ones.
    pub fn len(&self) -> usize {
        self.grants.read().expect("RwLock poisoned").len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get(&self, key: &str) -> Result<Option<PermissionInfo>, StoreError> {
        {
            let grants = self.grants.read().expect("RwLock poisoned");
            match grants.get(key) {
                None => return Ok(None),
                Some(info) if !info.is_expired(Utc::now()) => return Ok(Some(info.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock, re-checking in case another
        // task replaced the record in between.
        let mut grants = self.grants.write().expect("RwLock poisoned");
        if grants
            .get(key)
            .is_some_and(|info| info.is_expired(Utc::now()))
        {
            grants.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        granted: bool,
        expiry: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<(), StoreError> {
        if let Some(info) = PermissionInfo::from_spec(granted, expiry, metadata) {
            self.grants
                .write()
                .expect("RwLock poisoned")
                .insert(key.to_string(), info);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.grants.write().expect("RwLock poisoned").remove(key);
        Ok(())
    }

    async fn clear_expired(&self) -> Result<(), StoreError> {
        let now = Utc::now();
        self.grants
            .write()
            .expect("RwLock poisoned")
            .retain(|_, info| !info.is_expired(now));
        Ok(())
    }
}
