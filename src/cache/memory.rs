//! Process-local hash backend for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CacheError, FieldRef, KvBackend};

const NAME: &str = "memory";

/// Hashes keyed by cache key. Each call locks one shard, so single-field
/// operations are atomic but nothing spans two calls.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    hashes: DashMap<String, HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a whole hash, as an eviction would.
    pub fn remove(&self, key: &str) {
        self.hashes.remove(key);
    }

    /// Overwrite a field without going through the cache layer.
    pub fn put_raw(&self, key: &str, field: &str, value: &str) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn raw_field(&self, key: &str, field: &str) -> Option<String> {
        self.hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned())
    }

    /// Number of fields in one hash.
    pub fn field_count(&self, key: &str) -> usize {
        self.hashes.get(key).map(|hash| hash.len()).unwrap_or(0)
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        Ok(self.raw_field(key, field))
    }

    async fn hget_many(&self, fields: &[FieldRef<'_>]) -> Result<Vec<Option<String>>, CacheError> {
        Ok(fields
            .iter()
            .map(|field| self.raw_field(field.key, field.field))
            .collect())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.put_raw(key, field, value);
        Ok(())
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        let mut hash = self.hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError> {
        let emptied = match self.hashes.get_mut(key) {
            Some(mut hash) => {
                hash.remove(field);
                hash.is_empty()
            }
            None => false,
        };
        if emptied {
            self.hashes.remove_if(key, |_, hash| hash.is_empty());
        }
        Ok(())
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError> {
        let mut hash = self.hashes.entry(key.to_string()).or_default();
        let current = match hash.get(field) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                CacheError::rejected(NAME, "hincr", "hash value is not an integer")
            })?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::rejected(NAME, "hincr", "increment would overflow"))?;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }
}
