// src/store/kv.rs

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::errors::{EngineError, Result};

/// Key-value store keyed by string ids.
///
/// `get` reports a missing key as [`EngineError::NotFound`]; callers that
/// treat absence as a normal outcome match on it explicitly.
#[async_trait]
pub trait KeyValue<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V>;

    async fn set(&self, key: &str, value: V) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    /// Set `value` only if `key` is absent.
    ///
    /// Returns the value stored under `key` after the call and whether this
    /// call inserted it.
    async fn get_or_set(&self, key: &str, value: V) -> Result<(V, bool)>;

    /// Replace the value under `key` with `new` only if it still equals
    /// `current`. Returns whether the swap happened; a missing key never
    /// swaps.
    async fn compare_and_set(&self, key: &str, current: &V, new: V) -> Result<bool>
    where
        V: PartialEq;
}

/// In-memory [`KeyValue`] adapter.
#[derive(Debug)]
pub struct MemoryKv<V> {
    entries: Arc<RwLock<HashMap<String, V>>>,
}

impl<V> Clone for MemoryKv<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for MemoryKv<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<V> MemoryKv<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, V>>> {
        self.entries
            .read()
            .map_err(|_| EngineError::Store("kv lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, V>>> {
        self.entries
            .write()
            .map_err(|_| EngineError::Store("kv lock poisoned".to_string()))
    }
}

#[async_trait]
impl<V> KeyValue<V> for MemoryKv<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        let entries = self.read()?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: V) -> Result<()> {
        let mut entries = self.write()?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut entries = self.write()?;
        entries.remove(key);
        Ok(())
    }

    async fn get_or_set(&self, key: &str, value: V) -> Result<(V, bool)> {
        let mut entries = self.write()?;
        if let Some(existing) = entries.get(key) {
            return Ok((existing.clone(), false));
        }
        entries.insert(key.to_string(), value.clone());
        Ok((value, true))
    }

    async fn compare_and_set(&self, key: &str, current: &V, new: V) -> Result<bool>
    where
        V: PartialEq,
    {
        let mut entries = self.write()?;
        match entries.get_mut(key) {
            Some(existing) if existing == current => {
                *existing = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
