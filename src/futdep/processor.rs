// src/futdep/processor.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::{EngineError, Result};
use crate::future::FutureId;
use crate::shutdown::Shutdown;
use crate::store::{Delivery, Queue};

use super::FutdepManager;

/// Drains the resolution queue and resolves the mapped dependencies.
pub struct FutdepProcessor {
    manager: Arc<FutdepManager>,
    resolutions: Arc<dyn Queue<FutureId>>,
    backoff: Duration,
}

impl FutdepProcessor {
    pub fn new(
        manager: Arc<FutdepManager>,
        resolutions: Arc<dyn Queue<FutureId>>,
        backoff: Duration,
    ) -> Self {
        Self {
            manager,
            resolutions,
            backoff,
        }
    }

    /// Handle one resolved future id. Store failures roll the delivery
    /// back for another attempt.
    pub async fn process_one(&self, delivery: Delivery<FutureId>) -> Result<bool> {
        match self.manager.resolve_future(delivery.item()).await {
            Ok(resolved) => {
                delivery.commit()?;
                Ok(resolved)
            }
            Err(err) => {
                delivery.rollback()?;
                Err(err)
            }
        }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        info!("futdep processor started");
        loop {
            let next = tokio::select! {
                _ = shutdown.wait() => break,
                next = self.resolutions.take() => next,
            };

            let result = match next {
                Ok(delivery) => self.process_one(delivery).await,
                Err(EngineError::Closed(_)) => break,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                warn!(error = %err, "failed to resolve future dependency");
                if shutdown.sleep(self.backoff).await {
                    break;
                }
            }
        }
        info!("futdep processor stopped");
    }
}
