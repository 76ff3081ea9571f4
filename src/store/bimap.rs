// src/store/bimap.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;
use crate::store::kv::KeyValue;

/// Persisted bijective index between string keys and string values.
///
/// The depot uses it for group id <-> task id.
#[async_trait]
pub trait Bimap: Send + Sync {
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Value for `key`; `NotFound` if unbound.
    async fn by_key(&self, key: &str) -> Result<String>;

    /// Key for `value`; `NotFound` if unbound.
    async fn by_value(&self, value: &str) -> Result<String>;

    /// Remove the pair whose key is `key`. Unknown keys are a no-op.
    async fn delete_by_key(&self, key: &str) -> Result<()>;
}

/// [`Bimap`] stored as two key-value maps, one per direction.
///
/// `save` writes the forward entry first. A failure between the two writes
/// leaves a forward-only pair, which `by_key` still serves.
pub struct KvBimap {
    forward: Arc<dyn KeyValue<String>>,
    backward: Arc<dyn KeyValue<String>>,
}

impl KvBimap {
    pub fn new(forward: Arc<dyn KeyValue<String>>, backward: Arc<dyn KeyValue<String>>) -> Self {
        Self { forward, backward }
    }
}

#[async_trait]
impl Bimap for KvBimap {
    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.forward.set(key, value.to_string()).await?;
        self.backward.set(value, key.to_string()).await
    }

    async fn by_key(&self, key: &str) -> Result<String> {
        self.forward.get(key).await
    }

    async fn by_value(&self, value: &str) -> Result<String> {
        self.backward.get(value).await
    }

    async fn delete_by_key(&self, key: &str) -> Result<()> {
        match self.forward.get(key).await {
            Ok(value) => {
                self.forward.del(key).await?;
                self.backward.del(&value).await
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
