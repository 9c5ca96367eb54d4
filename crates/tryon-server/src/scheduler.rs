//! Background reconciliation scheduler.
//!
//! An explicit start/stop lifecycle object rather than a module-level
//! singleton: the composition root owns it, and tests drive ticks
//! manually through [`Orchestrator::reconcile_all`] instead of waiting
//! on wall-clock time.

use std::sync::Mutex;
use std::time::Duration;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

/// Fixed-interval reconciliation loop over all in-flight tasks.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler ticking at `interval`.
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Start the background loop. Calling start twice is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().expect("scheduler handle lock");
        if handle.is_some() {
            warn!("Scheduler is already running");
            return;
        }

        let orchestrator = self.orchestrator.clone();
        let shutdown = self.shutdown.clone();
        let tick = self.interval;

        info!(interval_secs = tick.as_secs_f64(), "Starting reconciliation scheduler");

        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // First tick fires immediately, matching start-then-check.
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => orchestrator.reconcile_all().await,
                }
            }
            info!("Reconciliation scheduler stopped");
        }));
    }

    /// Stop the loop and wait for the in-progress tick to finish.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().expect("scheduler handle lock").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Whether the background loop has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("scheduler handle lock")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetStore;
    use crate::store::TaskStore;
    use crate::usage::InMemoryUsage;
    use async_trait::async_trait;
    use tryon_core::JobId;
    use tryon_provider::{JobStatus, Provider, ProviderError, SubmitJob};

    struct NoopProvider;

    #[async_trait]
    impl Provider for NoopProvider {
        async fn submit(&self, _job: &SubmitJob) -> Result<JobId, ProviderError> {
            Ok(JobId::new("noop"))
        }
        async fn status(&self, _job_id: &JobId) -> Result<JobStatus, ProviderError> {
            Err(ProviderError::Timeout)
        }
        async fn download(&self, _url: &str) -> Result<Vec<u8>, ProviderError> {
            Err(ProviderError::Timeout)
        }
    }

    fn orchestrator(dir: &tempfile::TempDir) -> Arc<Orchestrator> {
        let assets = Arc::new(AssetStore::new(dir.path()).expect("asset store"));
        Arc::new(Orchestrator::new(
            Arc::new(TaskStore::new()),
            assets,
            Arc::new(NoopProvider),
            Arc::new(InMemoryUsage::new()),
            720,
        ))
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheduler = Scheduler::new(orchestrator(&dir), Duration::from_millis(10));
        assert!(!scheduler.is_running());

        scheduler.start();
        assert!(scheduler.is_running());

        // Second start is a no-op, not a second loop.
        scheduler.start();

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }
}
