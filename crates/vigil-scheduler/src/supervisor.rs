//! Worker lifecycle ownership: spawn, monitor, and bounded-time shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::ConfigError;
use crate::recorder::Recorder;
use crate::scheduler::Scheduler;
use crate::types::Registry;

/// Bookkeeping for one spawned worker unit. Owned exclusively by the
/// [`Supervisor`]; never shared with job code.
struct WorkerHandle {
    group: String,
    handle: JoinHandle<()>,
}

/// Owns one worker unit per registry group and their shutdown channel.
///
/// Workers are tokio tasks, each running its own [`Scheduler`] loop over its
/// own job specs, with no shared mutable state between units. Cross-unit
/// coordination is limited to the one-directional shutdown signal.
pub struct Supervisor {
    workers: Vec<WorkerHandle>,
    shutdown_tx: watch::Sender<bool>,
    shutting_down: bool,
}

impl Supervisor {
    /// Spawn one worker per registry group and return the supervision handle.
    pub fn start(registry: Registry, recorder: Arc<dyn Recorder>) -> Result<Self, ConfigError> {
        Self::start_with_tick(registry, recorder, None)
    }

    /// Like [`Supervisor::start`] with an explicit scheduler polling tick.
    pub fn start_with_tick(
        registry: Registry,
        recorder: Arc<dyn Recorder>,
        tick: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if registry.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = Vec::new();

        for group in registry.into_groups() {
            let jobs: Vec<&str> = group.specs.iter().map(|s| s.name.as_str()).collect();
            info!(group = %group.name, jobs = ?jobs, "spawning worker");

            let mut scheduler = Scheduler::new(group.specs, Arc::clone(&recorder));
            if let Some(tick) = tick {
                scheduler = scheduler.with_tick(tick);
            }

            let handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));
            workers.push(WorkerHandle {
                group: group.name,
                handle,
            });
        }

        Ok(Self {
            workers,
            shutdown_tx,
            shutting_down: false,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Stop all workers, waiting up to `grace` for each before escalating
    /// to forced termination.
    ///
    /// Workers are joined concurrently, so total shutdown latency is bounded
    /// by `grace`, not `N x grace`. Idempotent: a re-entrant call while a
    /// shutdown is in progress (or after one completed) returns immediately.
    /// Forced termination is logged, never treated as a supervisor error.
    pub async fn shutdown(&mut self, grace: Duration) {
        if self.shutting_down {
            debug!("shutdown already in progress, ignoring re-entrant request");
            return;
        }
        self.shutting_down = true;

        info!(
            workers = self.workers.len(),
            grace_secs = grace.as_secs(),
            "shutting down workers"
        );
        let _ = self.shutdown_tx.send(true);

        let joins = self.workers.drain(..).map(|worker| async move {
            let WorkerHandle { group, mut handle } = worker;
            match timeout(grace, &mut handle).await {
                Ok(Ok(())) => info!(group = %group, "worker stopped"),
                Ok(Err(e)) if e.is_panic() => {
                    error!(group = %group, "worker found dead at shutdown (panicked)")
                }
                Ok(Err(_)) => warn!(group = %group, "worker was cancelled before join"),
                Err(_) => {
                    warn!(group = %group, "worker ignored graceful stop, forcing termination");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        });
        join_all(joins).await;

        info!("all workers stopped");
    }

    /// Join workers that exit on their own. Surfaces dead workers in the log
    /// the same way shutdown does; no auto-restart.
    pub async fn wait(&mut self) {
        for worker in self.workers.drain(..) {
            match worker.handle.await {
                Ok(()) => info!(group = %worker.group, "worker exited"),
                Err(e) if e.is_panic() => {
                    error!(group = %worker.group, "worker found dead (panicked)")
                }
                Err(_) => warn!(group = %worker.group, "worker was cancelled"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::types::{Action, BoxError, JobSpec, Outcome, OutcomeKind};
    use crate::window::TimeWindow;
    use async_trait::async_trait;

    struct NullRecorder;

    #[async_trait]
    impl Recorder for NullRecorder {
        async fn record(&self, _outcome: &Outcome) -> Result<(), RecorderError> {
            Ok(())
        }
    }

    struct QuickAction;

    #[async_trait]
    impl Action for QuickAction {
        async fn run(&self) -> Result<OutcomeKind, BoxError> {
            Ok(OutcomeKind::Success { response: None })
        }
    }

    /// An action that never yields back within any reasonable grace period.
    struct StubbornAction;

    #[async_trait]
    impl Action for StubbornAction {
        async fn run(&self) -> Result<OutcomeKind, BoxError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(OutcomeKind::Success { response: None })
        }
    }

    struct PanickingAction;

    #[async_trait]
    impl Action for PanickingAction {
        async fn run(&self) -> Result<OutcomeKind, BoxError> {
            panic!("worker fault");
        }
    }

    fn job(name: &str, action: Arc<dyn Action>) -> JobSpec {
        JobSpec::new(
            name,
            chrono::Duration::seconds(60),
            chrono::Duration::hours(1),
            TimeWindow::always(),
            action,
        )
    }

    fn registry_of(specs: Vec<JobSpec>) -> Registry {
        let mut registry = Registry::new();
        for spec in specs {
            registry.register(spec).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn start_rejects_empty_registry() {
        let result = Supervisor::start(Registry::new(), Arc::new(NullRecorder));
        assert!(matches!(result, Err(ConfigError::EmptyRegistry)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_cooperative_workers_within_grace() {
        let registry = registry_of(vec![
            job("ping", Arc::new(QuickAction)),
            job("sweep", Arc::new(QuickAction)),
        ]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();
        assert_eq!(supervisor.worker_count(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        supervisor.shutdown(Duration::from_secs(5)).await;

        assert_eq!(supervisor.worker_count(), 0);
        assert!(supervisor.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent() {
        let registry = registry_of(vec![job("ping", Arc::new(QuickAction))]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();

        supervisor.shutdown(Duration::from_secs(5)).await;
        // Re-entrant call must not hang or double-free worker handles.
        supervisor.shutdown(Duration::from_secs(5)).await;

        assert_eq!(supervisor.worker_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_worker_is_force_terminated_within_grace() {
        let registry = registry_of(vec![job("stuck", Arc::new(StubbornAction))]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();

        // Let the worker enter its never-returning action.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let started = tokio::time::Instant::now();
        supervisor.shutdown(Duration::from_secs(5)).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_latency_is_bounded_by_grace_not_worker_count() {
        let registry = registry_of(vec![
            job("stuck-a", Arc::new(StubbornAction)),
            job("stuck-b", Arc::new(StubbornAction)),
            job("stuck-c", Arc::new(StubbornAction)),
        ]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        let started = tokio::time::Instant::now();
        supervisor.shutdown(Duration::from_secs(5)).await;
        let elapsed = started.elapsed();

        // Joined concurrently: one grace period, not three.
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn dead_worker_surfaces_at_shutdown_without_hanging() {
        let registry = registry_of(vec![job("doomed", Arc::new(PanickingAction))]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();

        // Give the worker time to panic on its first tick.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let started = tokio::time::Instant::now();
        supervisor.shutdown(Duration::from_secs(5)).await;

        // The dead worker joins immediately; no grace wait needed.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_after_shutdown_returns_immediately() {
        let registry = registry_of(vec![job("ping", Arc::new(QuickAction))]);
        let mut supervisor = Supervisor::start(registry, Arc::new(NullRecorder)).unwrap();

        supervisor.shutdown(Duration::from_secs(5)).await;
        supervisor.wait().await;

        assert_eq!(supervisor.worker_count(), 0);
    }
}
