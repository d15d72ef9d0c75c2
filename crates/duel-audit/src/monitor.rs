//! Continuous diagnostic monitoring.
//!
//! [`DiagnosticMonitor`] runs the auditor on demand or on a fixed interval.
//! Each pass is compiled into an [`AuditReport`], stored as the latest
//! report, and published on a broadcast channel for live subscribers (the
//! diagnostics `WebSocket`). At most one monitoring loop runs at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use duel_core::config::MIN_MONITOR_INTERVAL_MS;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::auditor::ConsistencyAuditor;
use crate::error::MonitorError;
use crate::model::{LogicalModel, RenderProjection};
use crate::reporter::{AuditReport, compile};

/// Capacity of the report broadcast channel.
///
/// A subscriber that falls further behind skips to the newest report.
const BROADCAST_CAPACITY: usize = 64;

/// Everything one audit pass needs, shared with the monitoring task.
struct Pass {
    auditor: ConsistencyAuditor,
    model: Arc<dyn LogicalModel>,
    projection: Arc<dyn RenderProjection>,
    latest: RwLock<Option<AuditReport>>,
    tx: broadcast::Sender<AuditReport>,
}

impl Pass {
    async fn run(&self) -> AuditReport {
        let divergences = self
            .auditor
            .run_audit(self.model.as_ref(), self.projection.as_ref());
        let report = compile(divergences);

        if report.is_clean() {
            debug!("Audit pass clean");
        } else {
            warn!(total = report.total_count(), summary = %report, "Audit pass found divergences");
        }

        *self.latest.write().await = Some(report.clone());
        // No subscribers is fine.
        let _ = self.tx.send(report.clone());
        report
    }
}

/// Drives audit passes and keeps the latest report.
pub struct DiagnosticMonitor {
    pass: Arc<Pass>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DiagnosticMonitor {
    /// Create a stopped monitor over the given collaborators.
    pub fn new(
        auditor: ConsistencyAuditor,
        model: Arc<dyn LogicalModel>,
        projection: Arc<dyn RenderProjection>,
    ) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            pass: Arc::new(Pass {
                auditor,
                model,
                projection,
                latest: RwLock::new(None),
                tx,
            }),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one audit pass now and return its report.
    pub async fn run_once(&self) -> AuditReport {
        self.pass.run().await
    }

    /// Start auditing every `interval`, beginning immediately.
    ///
    /// Returns `Ok(false)` and logs a warning if a loop is already
    /// running. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::IntervalTooShort`] for intervals under the
    /// configured minimum.
    pub fn start_monitoring(&self, interval: Duration) -> Result<bool, MonitorError> {
        let minimum = Duration::from_millis(MIN_MONITOR_INTERVAL_MS);
        if interval < minimum {
            return Err(MonitorError::IntervalTooShort { interval, minimum });
        }

        let mut task = self.task();
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Monitoring already running, ignoring start request");
            return Ok(false);
        }

        let pass = Arc::clone(&self.pass);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                pass.run().await;
            }
        }));

        info!(?interval, "Diagnostic monitoring started");
        Ok(true)
    }

    /// Stop the monitoring loop. Returns whether one was running.
    pub fn stop_monitoring(&self) -> bool {
        let Some(handle) = self.task().take() else {
            return false;
        };
        let was_running = !handle.is_finished();
        handle.abort();
        if was_running {
            info!("Diagnostic monitoring stopped");
        }
        was_running
    }

    /// Whether a monitoring loop is active.
    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The most recent report, from either a loop tick or [`run_once`](Self::run_once).
    pub async fn latest(&self) -> Option<AuditReport> {
        self.pass.latest.read().await.clone()
    }

    /// Receive every report compiled from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditReport> {
        self.pass.tx.subscribe()
    }
}

impl Drop for DiagnosticMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use duel_types::{DivergenceCategory, EntityRecord, PhaseName, RenderNode};

    use super::*;
    use crate::error::CollaboratorError;

    /// Model whose entity query counts how often it was called.
    #[derive(Default)]
    struct CountingModel {
        reads: AtomicU32,
    }

    impl LogicalModel for CountingModel {
        fn phase(&self) -> Result<PhaseName, CollaboratorError> {
            Ok(PhaseName::from("player-main"))
        }

        fn entities(&self) -> Result<Vec<EntityRecord>, CollaboratorError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct DownScene;

    impl RenderProjection for DownScene {
        fn nodes(&self) -> Result<Vec<RenderNode>, CollaboratorError> {
            Err(CollaboratorError::unavailable("no scene"))
        }
    }

    fn monitor(model: Arc<CountingModel>) -> DiagnosticMonitor {
        DiagnosticMonitor::new(ConsistencyAuditor::default(), model, Arc::new(DownScene))
    }

    #[tokio::test]
    async fn run_once_stores_latest() {
        let monitor = monitor(Arc::new(CountingModel::default()));
        assert!(monitor.latest().await.is_none());

        let report = monitor.run_once().await;
        assert_eq!(report.count(DivergenceCategory::AuditorUnavailable), 1);
        assert_eq!(monitor.latest().await, Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_publishes_each_interval() {
        let model = Arc::new(CountingModel::default());
        let monitor = monitor(Arc::clone(&model));
        let mut rx = monitor.subscribe();

        assert!(monitor.start_monitoring(Duration::from_secs(1)).unwrap());
        let first = rx.recv().await.unwrap();
        assert_eq!(first.total_count(), 1);
        assert_eq!(model.reads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let _second = rx.recv().await.unwrap();
        assert_eq!(model.reads.load(Ordering::SeqCst), 2);
        assert!(monitor.latest().await.is_some());

        assert!(monitor.stop_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_a_noop() {
        let monitor = monitor(Arc::new(CountingModel::default()));
        assert!(monitor.start_monitoring(Duration::from_secs(1)).unwrap());
        assert!(!monitor.start_monitoring(Duration::from_secs(2)).unwrap());
        assert!(monitor.is_running());
        monitor.stop_monitoring();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_passes() {
        let model = Arc::new(CountingModel::default());
        let monitor = monitor(Arc::clone(&model));
        let mut rx = monitor.subscribe();

        monitor.start_monitoring(Duration::from_millis(500)).unwrap();
        let _ = rx.recv().await.unwrap();

        assert!(monitor.stop_monitoring());
        assert!(!monitor.stop_monitoring());
        assert!(!monitor.is_running());

        let reads = model.reads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(model.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test]
    async fn rejects_short_interval() {
        let monitor = monitor(Arc::new(CountingModel::default()));
        let result = monitor.start_monitoring(Duration::from_millis(10));
        assert!(matches!(result, Err(MonitorError::IntervalTooShort { .. })));
        assert!(!monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let monitor = monitor(Arc::new(CountingModel::default()));
        monitor.start_monitoring(Duration::from_secs(1)).unwrap();
        monitor.stop_monitoring();
        assert!(monitor.start_monitoring(Duration::from_secs(1)).unwrap());
        monitor.stop_monitoring();
    }
}
