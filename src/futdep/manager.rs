// src/futdep/manager.rs

use std::sync::Arc;

use tracing::debug;

use crate::deps::{DependencyId, Deps};
use crate::errors::Result;
use crate::future::{FutureId, FutureManager};
use crate::store::KeyValue;

pub struct FutdepManager {
    deps: Arc<dyn Deps>,
    fut2dep: Arc<dyn KeyValue<DependencyId>>,
    futures: Arc<FutureManager>,
}

impl FutdepManager {
    pub fn new(
        deps: Arc<dyn Deps>,
        fut2dep: Arc<dyn KeyValue<DependencyId>>,
        futures: Arc<FutureManager>,
    ) -> Self {
        Self {
            deps,
            fut2dep,
            futures,
        }
    }

    /// Dependency standing for `future`, created on first reference.
    ///
    /// Concurrent first calls agree on one id: the loser of the
    /// conditional write adopts the winner's dependency.
    pub async fn make(&self, future: &str) -> Result<DependencyId> {
        match self.fut2dep.get(future).await {
            Ok(dependency) => return Ok(dependency),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let candidate = self.deps.new_dependency();
        let (dependency, inserted) = self.fut2dep.get_or_set(future, candidate.id).await?;
        if inserted {
            debug!(future, dependency = %dependency, "future mapped to dependency");
        }

        // The future may have resolved before anyone depended on it; its
        // resolution then found no mapping and resolved nothing.
        if self.futures.is_resolved(future).await? {
            debug!(future, dependency = %dependency, "future already resolved");
            self.deps.resolve(&dependency).await?;
        }

        Ok(dependency)
    }

    /// Resolve the dependency mapped to `future`.
    ///
    /// Returns `false` when nothing depends on the future yet.
    pub async fn resolve_future(&self, future: &FutureId) -> Result<bool> {
        let dependency = match self.fut2dep.get(future).await {
            Ok(dependency) => dependency,
            Err(err) if err.is_not_found() => {
                debug!(future = %future, "no dependency mapped to future");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        self.deps.resolve(&dependency).await?;
        Ok(true)
    }
}
