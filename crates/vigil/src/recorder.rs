//! HTTP-backed outcome recorder.

use async_trait::async_trait;
use vigil_scheduler::{Outcome, Recorder, RecorderError};

/// POSTs each outcome as JSON to a document-store ingest endpoint.
///
/// The serialized record carries an `expireAt` timestamp; the backend is
/// expected to hold a TTL index on that field and remove expired records
/// itself. This process never queries or deletes them.
pub struct HttpRecorder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecorder {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Recorder for HttpRecorder {
    async fn record(&self, outcome: &Outcome) -> Result<(), RecorderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(outcome)
            .send()
            .await
            .map_err(|e| RecorderError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::Rejected(format!(
                "status {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
