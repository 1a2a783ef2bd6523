//! Windowed periodic-job scheduler and supervisor core for Vigil.
//!
//! This crate provides the supervision core:
//! - Immutable [`JobSpec`]s gathered into an ordered [`Registry`]
//! - A pure [`TimeWindow`] gate (IANA timezone, midnight-wrapping hours)
//! - A per-worker [`Scheduler`] loop that gates, runs, records, and
//!   reschedules jobs without letting one job's fault stop its siblings
//! - A [`Supervisor`] that owns worker lifecycles and guarantees a
//!   bounded-time, idempotent shutdown with forced-termination escalation
//!
//! Persistence lives behind the [`Recorder`] trait; outcome records carry
//! their own retention deadline and expire store-side.

mod error;
mod recorder;
mod scheduler;
mod supervisor;
mod types;
mod window;

pub use error::{ConfigError, RecorderError};
pub use recorder::Recorder;
pub use scheduler::Scheduler;
pub use supervisor::Supervisor;
pub use types::{Action, BoxError, JobGroup, JobSpec, Outcome, OutcomeKind, Registry, SkipPolicy};
pub use window::{DayRule, HourRange, TimeWindow};
