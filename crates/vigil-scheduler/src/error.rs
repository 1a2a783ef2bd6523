//! Error types for the scheduler core.

use thiserror::Error;

/// Fatal configuration errors, raised at startup before any worker spawns.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A job name was registered twice.
    #[error("duplicate job name: {0}")]
    DuplicateJob(String),

    /// The timezone string is not a valid IANA zone id.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// An hour range was outside 0..24.
    #[error("invalid hour range: {0}")]
    InvalidHours(String),

    /// The registry contains no jobs.
    #[error("registry is empty, nothing to supervise")]
    EmptyRegistry,
}

/// Errors from a [`Recorder`](crate::Recorder) implementation.
///
/// The scheduler logs and discards these; a lost record never stops the loop.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The persistence backend could not be reached.
    #[error("recorder backend unreachable: {0}")]
    Unreachable(String),

    /// The backend rejected the outcome record.
    #[error("recorder rejected outcome: {0}")]
    Rejected(String),
}
