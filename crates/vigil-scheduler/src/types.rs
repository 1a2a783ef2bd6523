//! Core job and outcome types.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::window::TimeWindow;

/// Boxed error for truly unexpected action faults.
///
/// Expected failure modes (non-success HTTP status, parse miss) are
/// classified by the action itself as [`OutcomeKind::Failure`]; the `Err`
/// channel is reserved for faults the action could not classify, which the
/// scheduler converts to [`OutcomeKind::Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of periodic work.
///
/// Implementations perform their own bounded-timeout I/O and classify
/// expected failures into an [`Outcome`] rather than returning `Err`.
#[async_trait]
pub trait Action: Send + Sync {
    /// Execute one run of the job and classify the result.
    async fn run(&self) -> Result<OutcomeKind, BoxError>;
}

/// Policy for jobs whose allowed window excludes the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Record an [`OutcomeKind::Skipped`] outcome for the due tick.
    Record,
    /// Suppress the skip with a log line only.
    LogOnly,
}

/// Immutable specification of one periodic job.
///
/// Created once at startup from configuration; never mutated afterwards.
#[derive(Clone)]
pub struct JobSpec {
    /// Unique name across the registry.
    pub name: String,
    /// Fixed run interval. The next due time is always `now + interval`,
    /// not "interval after completion".
    pub interval: chrono::Duration,
    /// Retention period for recorded outcomes.
    pub ttl: chrono::Duration,
    /// Allowed time window; evaluated fresh on every due tick.
    pub window: TimeWindow,
    /// What to do when a due tick falls outside the window.
    pub skip_policy: SkipPolicy,
    /// The work itself.
    pub action: Arc<dyn Action>,
}

impl JobSpec {
    /// Create a job spec with the default skip policy ([`SkipPolicy::LogOnly`]).
    pub fn new(
        name: impl Into<String>,
        interval: chrono::Duration,
        ttl: chrono::Duration,
        window: TimeWindow,
        action: Arc<dyn Action>,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            ttl,
            window,
            skip_policy: SkipPolicy::LogOnly,
            action,
        }
    }

    /// Override the skip policy.
    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("ttl", &self.ttl)
            .field("window", &self.window)
            .field("skip_policy", &self.skip_policy)
            .finish_non_exhaustive()
    }
}

/// Classified result of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The action succeeded, optionally with a response payload.
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    /// An expected failure mode (non-success status, parse miss).
    Failure { reason: String },
    /// An unexpected fault, caught at the scheduler boundary.
    Error { message: String },
    /// The due tick fell outside the allowed window.
    Skipped,
}

/// One recorded attempt of a job, with its retention deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Name of the job that produced this outcome.
    pub job: String,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    /// When the attempt happened (UTC).
    pub timestamp: DateTime<Utc>,
    /// When the record becomes eligible for removal by the store.
    #[serde(rename = "expireAt")]
    pub expire_at: DateTime<Utc>,
}

impl Outcome {
    /// Build an outcome at `timestamp` with a retention deadline of
    /// `timestamp + ttl`.
    pub fn new(
        job: impl Into<String>,
        kind: OutcomeKind,
        timestamp: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            job: job.into(),
            kind,
            timestamp,
            expire_at: timestamp + ttl,
        }
    }
}

/// One worker unit's worth of jobs.
///
/// All specs in a group run on the same scheduler loop, in registration order.
#[derive(Debug, Clone)]
pub struct JobGroup {
    /// Worker unit name, used in spawn/shutdown logs.
    pub name: String,
    /// Jobs owned by this worker, in registration order.
    pub specs: Vec<JobSpec>,
}

/// Ordered registry of job specs. Insertion order is startup order.
#[derive(Debug, Default)]
pub struct Registry {
    groups: Vec<JobGroup>,
    names: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job in its own worker unit, named after the job.
    pub fn register(&mut self, spec: JobSpec) -> Result<(), ConfigError> {
        let group = spec.name.clone();
        self.register_group(group, vec![spec])
    }

    /// Register several jobs sharing one worker unit.
    pub fn register_group(
        &mut self,
        name: impl Into<String>,
        specs: Vec<JobSpec>,
    ) -> Result<(), ConfigError> {
        for spec in &specs {
            if !self.names.insert(spec.name.clone()) {
                return Err(ConfigError::DuplicateJob(spec.name.clone()));
            }
        }
        self.groups.push(JobGroup {
            name: name.into(),
            specs,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[JobGroup] {
        &self.groups
    }

    /// All job names in registration order.
    pub fn job_names(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.specs.iter().map(|s| s.name.as_str()))
            .collect()
    }

    pub(crate) fn into_groups(self) -> Vec<JobGroup> {
        self.groups
    }
}
