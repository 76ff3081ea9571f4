// src/meta/mod.rs

//! Per-task metadata, written once at spawn time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Result;
use crate::kernel::{BeforeInitialized, Plugin, SpawnContext, SpawnOption, option};
use crate::store::KeyValue;

pub const DATA_KEY: &str = "meta";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaData {
    pub entries: BTreeMap<String, Value>,
}

/// Attach `key = value` to the spawning task's metadata.
pub fn with_entry(key: impl Into<String>, value: impl Into<Value>) -> SpawnOption {
    let key = key.into();
    let value = value.into();
    option(move |ctx| {
        ctx.data_mut()
            .get_or_default::<MetaData>(DATA_KEY)?
            .entries
            .insert(key, value);
        Ok(())
    })
}

fn storage_key(task: &str, key: &str) -> String {
    format!("{task}/{key}")
}

pub struct MetaManager {
    storage: Arc<dyn KeyValue<Value>>,
}

impl MetaManager {
    pub fn new(storage: Arc<dyn KeyValue<Value>>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, task: &str, key: &str) -> Result<Value> {
        self.storage.get(&storage_key(task, key)).await
    }

    /// Typed read of one entry.
    pub async fn load<T: DeserializeOwned>(&self, task: &str, key: &str) -> Result<T> {
        let value = self.get(task, key).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set(&self, task: &str, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.storage.set(&storage_key(task, key), value).await
    }

    pub async fn erase(&self, task: &str, key: &str) -> Result<()> {
        self.storage.del(&storage_key(task, key)).await
    }
}

pub struct MetaPlugin {
    manager: Arc<MetaManager>,
}

impl MetaPlugin {
    pub fn new(manager: Arc<MetaManager>) -> Self {
        Self { manager }
    }
}

impl Plugin for MetaPlugin {
    fn name(&self) -> &str {
        "meta"
    }

    fn as_before_initialized(&self) -> Option<&dyn BeforeInitialized> {
        Some(self)
    }
}

#[async_trait]
impl BeforeInitialized for MetaPlugin {
    async fn before_initialized(&self, ctx: &mut SpawnContext<'_>) -> Result<()> {
        let Some(data) = ctx.data().get::<MetaData>(DATA_KEY)? else {
            return Ok(());
        };
        let task = &ctx.task().id;
        for (key, value) in &data.entries {
            self.manager
                .storage
                .set(&storage_key(task, key), value.clone())
                .await?;
        }
        Ok(())
    }
}
