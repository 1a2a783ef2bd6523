//! Single-worker scheduling loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::recorder::Recorder;
use crate::types::{JobSpec, Outcome, OutcomeKind, SkipPolicy};

/// Fixed polling tick between due-time checks.
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// A job spec plus its mutable due-time.
struct JobState {
    spec: JobSpec,
    next_due: DateTime<Utc>,
}

/// Drives one worker unit's jobs on a cooperative single-threaded loop.
///
/// Each owned job is checked on a fixed tick; a due job is gated by its
/// allowed window, executed, recorded, and rescheduled to `now + interval`.
/// Fixed-interval scheduling means an overdue backlog collapses into one
/// run at the next available tick, never a queue.
pub struct Scheduler {
    jobs: Vec<JobState>,
    recorder: Arc<dyn Recorder>,
    tick: Duration,
}

impl Scheduler {
    /// Create a scheduler over `specs`. All jobs are due immediately.
    pub fn new(specs: Vec<JobSpec>, recorder: Arc<dyn Recorder>) -> Self {
        let now = Utc::now();
        let jobs = specs
            .into_iter()
            .map(|spec| JobState {
                spec,
                next_due: now,
            })
            .collect();
        Self {
            jobs,
            recorder,
            tick: DEFAULT_TICK,
        }
    }

    /// Override the polling tick (mainly for tests and fast deployments).
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Evaluate every owned job against `now`, in registration order.
    ///
    /// Public with an injected clock so due-time and window behavior is
    /// testable without waiting on real time.
    pub async fn tick_once(&mut self, now: DateTime<Utc>) {
        for state in &mut self.jobs {
            if now < state.next_due {
                continue;
            }

            let spec = &state.spec;
            let outcome = if !spec.window.allows(now) {
                match spec.skip_policy {
                    SkipPolicy::Record => {
                        debug!(job = %spec.name, "outside allowed window, recording skip");
                        Some(Outcome::new(spec.name.as_str(), OutcomeKind::Skipped, now, spec.ttl))
                    }
                    SkipPolicy::LogOnly => {
                        debug!(job = %spec.name, "outside allowed window, suppressing run");
                        None
                    }
                }
            } else {
                debug!(job = %spec.name, "job due, running action");
                let kind = match spec.action.run().await {
                    Ok(kind) => kind,
                    // A fault in one job must never stop the loop or its siblings.
                    Err(e) => {
                        error!(job = %spec.name, error = %e, "action raised unexpected fault");
                        OutcomeKind::Error {
                            message: e.to_string(),
                        }
                    }
                };
                Some(Outcome::new(spec.name.as_str(), kind, now, spec.ttl))
            };

            if let Some(outcome) = outcome {
                // Lost observability is preferable to lost liveness: a
                // recorder failure is logged and discarded, never retried.
                if let Err(e) = self.recorder.record(&outcome).await {
                    warn!(job = %spec.name, error = %e, "failed to record outcome, continuing");
                }
            }

            state.next_due = now + state.spec.interval;
        }
    }

    /// Run the scheduling loop until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(jobs = self.jobs.len(), "scheduler loop starting");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.tick_once(Utc::now()).await;

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = sleep(self.tick) => {}
            }
        }

        info!("scheduler loop stopped");
    }
}
