// src/future/mod.rs

//! Futures: write-once resource placeholders.
//!
//! [`FutureManager::resolve`] stores a resource for a future exactly once
//! (conditional set-if-absent) and then hands the resolution to a
//! [`Runner`]. The usual runner is a [`QueueRunner`] feeding the futdep
//! processor, often combined with others through a [`SequentialRunner`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{EngineError, Result};
use crate::store::KeyValue;

pub mod runner;

pub use runner::{QueueRunner, Runner, SequentialRunner};

pub type FutureId = String;

/// Immutable description of a future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureRecord {
    pub id: FutureId,
    pub future_type: String,
    pub param: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Ok,
    Failed,
}

/// What gets stored on resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub data: Vec<u8>,
    pub status: ResolutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub future: FutureRecord,
    pub resource: Vec<u8>,
    pub status: ResolutionStatus,
}

pub struct FutureManager {
    futures: Arc<dyn KeyValue<FutureRecord>>,
    resources: Arc<dyn KeyValue<Resource>>,
    runner: Arc<dyn Runner>,
}

impl FutureManager {
    pub fn new(
        futures: Arc<dyn KeyValue<FutureRecord>>,
        resources: Arc<dyn KeyValue<Resource>>,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self {
            futures,
            resources,
            runner,
        }
    }

    /// Allocate and persist a new future.
    pub async fn make(
        &self,
        future_type: impl Into<String>,
        param: impl Into<Vec<u8>>,
    ) -> Result<FutureRecord> {
        let future = FutureRecord {
            id: crate::deps::new_id(),
            future_type: future_type.into(),
            param: param.into(),
        };
        self.futures.set(&future.id, future.clone()).await?;
        debug!(future = %future.id, future_type = %future.future_type, "future created");
        Ok(future)
    }

    pub async fn get(&self, id: &str) -> Result<FutureRecord> {
        self.futures.get(id).await
    }

    /// Resolve `id` successfully with `resource`.
    pub async fn resolve(&self, id: &str, resource: impl Into<Vec<u8>>) -> Result<()> {
        self.settle(id, resource.into(), ResolutionStatus::Ok).await
    }

    /// Resolve `id` as failed. Dependents still become ready.
    pub async fn fail(&self, id: &str, reason: impl Into<Vec<u8>>) -> Result<()> {
        self.settle(id, reason.into(), ResolutionStatus::Failed).await
    }

    async fn settle(&self, id: &str, data: Vec<u8>, status: ResolutionStatus) -> Result<()> {
        let future = self.futures.get(id).await?;

        let (stored, inserted) = self
            .resources
            .get_or_set(id, Resource { data, status })
            .await?;
        if !inserted {
            return Err(EngineError::AlreadyResolved(id.to_string()));
        }

        debug!(future = %id, ?status, "future resolved");
        let resolution = Resolution {
            future,
            resource: stored.data,
            status: stored.status,
        };
        self.runner.run(&resolution).await
    }

    /// Whether a resolution exists for `id`.
    pub async fn is_resolved(&self, id: &str) -> Result<bool> {
        match self.resources.get(id).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Load the resolution of `id`, or [`EngineError::NotResolved`].
    pub async fn load(&self, id: &str) -> Result<Resolution> {
        let resource = match self.resources.get(id).await {
            Ok(resource) => resource,
            Err(err) if err.is_not_found() => {
                return Err(EngineError::NotResolved(id.to_string()));
            }
            Err(err) => return Err(err),
        };
        let future = self.futures.get(id).await?;

        Ok(Resolution {
            future,
            resource: resource.data,
            status: resource.status,
        })
    }
}
