//! Outcome persistence seam.

use async_trait::async_trait;

use crate::error::RecorderError;
use crate::types::Outcome;

/// Sink for job outcomes.
///
/// Implementations persist the record and arrange for automatic removal once
/// the outcome's `expire_at` deadline passes (for example via a store-level
/// TTL index keyed on the stored expiry timestamp). The scheduler never
/// queries or deletes records itself, and it tolerates recorder failures:
/// a failed `record` call is logged and discarded.
#[async_trait]
pub trait Recorder: Send + Sync {
    async fn record(&self, outcome: &Outcome) -> Result<(), RecorderError>;
}
