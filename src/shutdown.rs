// src/shutdown.rs

use std::time::Duration;

use tokio::sync::watch;

/// Cooperative stop signal shared by the background loops.
///
/// Cloned into every loop; all clones observe the same trigger. Dropping
/// the [`ShutdownTrigger`] counts as a shutdown request.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Create a connected trigger / signal pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if shutdown cut the sleep short.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.wait() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }

    /// Resolve once shutdown has been requested. Cancel safe.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_returns_early_on_trigger() {
        let (trigger, mut signal) = channel();
        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(60)).await });

        trigger.trigger();
        let interrupted = tokio::time::timeout(Duration::from_secs(1), sleeper)
            .await
            .expect("sleep ignored shutdown")
            .unwrap();
        assert!(interrupted);
    }

    #[tokio::test]
    async fn sleep_runs_to_completion_without_trigger() {
        let (_trigger, mut signal) = channel();
        assert!(!signal.sleep(Duration::from_millis(5)).await);
        assert!(!signal.is_triggered());
    }
}
