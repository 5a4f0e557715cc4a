//! Background reclamation task.

use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SessionBackend;
use crate::error::SessionError;
use crate::Result;

/// Default pause between two reclamation sweeps.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic task calling [`SessionBackend::reclaim`].
///
/// The task only holds a weak reference to its backend and ends on its own
/// once the backend is gone. Dropping the `Reclaimer` aborts the task.
#[derive(Debug)]
pub struct Reclaimer {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reclaimer {
    /// Start sweeping `backend` every `interval` on the current Tokio runtime.
    ///
    /// Fails with a configuration error when called outside a runtime.
    pub fn spawn<B>(backend: Weak<B>, interval: Duration) -> Result<Self>
    where
        B: SessionBackend + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| {
            SessionError::Configuration("reclaimer requires a Tokio runtime".to_string())
        })?;
        let (shutdown, mut stop) = watch::channel(false);

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }

                let Some(backend) = backend.upgrade() else {
                    break;
                };

                match backend.reclaim().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "reclaimed sessions"),
                    Err(e) => tracing::warn!(error = %e, "reclaim sweep failed"),
                }
            }

            tracing::debug!("reclaimer stopped");
        });

        Ok(Self {
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Stop the task and wait for an in-flight sweep to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::session::Session;

    #[derive(Default)]
    struct CountingBackend {
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl SessionBackend for CountingBackend {
        async fn save(&self, _session: &mut Session) -> Result<bool> {
            Ok(false)
        }

        async fn load(&self, id: &str) -> Result<Session> {
            Err(SessionError::NotFound(id.to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn contains(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }

        async fn reclaim(&self) -> Result<usize> {
            let n = self.sweeps.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(SessionError::Io(std::io::Error::other("flaky disk")))
            } else {
                Ok(1)
            }
        }
    }

    #[tokio::test]
    async fn test_sweeps_survive_errors() {
        let backend = Arc::new(CountingBackend::default());
        let reclaimer =
            Reclaimer::spawn(Arc::downgrade(&backend), Duration::from_millis(10)).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(reclaimer.is_running());
        assert!(backend.sweeps.load(Ordering::SeqCst) >= 3);

        reclaimer.shutdown().await;
        assert!(!reclaimer.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeps() {
        let backend = Arc::new(CountingBackend::default());
        let reclaimer =
            Reclaimer::spawn(Arc::downgrade(&backend), Duration::from_millis(10)).unwrap();
        reclaimer.shutdown().await;

        let after = backend.sweeps.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.sweeps.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn test_stops_when_backend_dropped() {
        let backend = Arc::new(CountingBackend::default());
        let reclaimer =
            Reclaimer::spawn(Arc::downgrade(&backend), Duration::from_millis(10)).unwrap();
        drop(backend);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!reclaimer.is_running());
    }

    #[test]
    fn test_spawn_outside_runtime() {
        let backend = Arc::new(CountingBackend::default());
        let err = Reclaimer::spawn(Arc::downgrade(&backend), DEFAULT_RECLAIM_INTERVAL).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }
}
