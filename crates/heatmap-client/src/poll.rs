//! Watch a processing job until it reaches a terminal state.

use std::time::Duration;

use heatmap_core::{JobSnapshot, JobState};
use uuid::Uuid;

use crate::client::HeatmapClient;
use crate::error::ClientError;

/// Reads the store's job status every `interval` until it is completed or
/// failed, calling `on_update` with each snapshot.
///
/// Each read carries the client's retry policy, so a transient failure
/// delays the next snapshot instead of ending the watch.
///
/// # Errors
///
/// - [`ClientError::JobFailed`] when the job ends in `error`.
/// - [`ClientError::NoJob`] when the store has never started a job.
/// - [`ClientError::UpstreamUnavailable`] when a read exhausts its retries.
pub async fn poll_until_terminal<F>(
    client: &HeatmapClient,
    store_id: Uuid,
    interval: Duration,
    mut on_update: F,
) -> Result<JobSnapshot, ClientError>
where
    F: FnMut(&JobSnapshot),
{
    let mut polls = 0u32;
    loop {
        let snapshot = client.processing_status(store_id).await?;
        polls += 1;
        on_update(&snapshot);

        match &snapshot.state {
            JobState::Completed { .. } => {
                tracing::info!(%store_id, polls, "processing completed");
                return Ok(snapshot);
            }
            JobState::Error { message } => {
                tracing::warn!(%store_id, polls, %message, "processing failed");
                return Err(ClientError::JobFailed(message.clone()));
            }
            JobState::NotStarted => return Err(ClientError::NoJob(store_id)),
            JobState::Processing { .. } => {
                tracing::debug!(
                    %store_id,
                    progress = snapshot.overall_progress().unwrap_or(0.0),
                    "still processing"
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}
