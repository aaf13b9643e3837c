//! In-memory processing job registry, one job slot per store.
//!
//! All transitions happen under a single write lock, so `start` is an atomic
//! compare-and-set and a completed or failed job can never be revived by a
//! late pipeline call. Nothing here runs on a timer; the registry only moves
//! when the pipeline (or an operator) calls it.
//!
//! Persisting results takes a finalize claim first: the job stays
//! `processing` to readers, but progress, `fail`, `complete` and further
//! claims are refused until the claim holder calls
//! [`JobRegistry::finish_finalize`] or [`JobRegistry::abort_finalize`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraProgress {
    pub name: String,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
}

/// Counts reported when a job completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSummary {
    pub hourly_heatmaps: usize,
    pub daily_heatmaps: usize,
    pub insights_generated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Processing {
        progress: BTreeMap<Uuid, CameraProgress>,
        message: String,
    },
    Completed {
        result: JobSummary,
        message: String,
    },
    Error {
        message: String,
    },
}

impl JobState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            JobState::NotStarted => "not_started",
            JobState::Processing { .. } => "processing",
            JobState::Completed { .. } => "completed",
            JobState::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Error { .. })
    }
}

/// Point-in-time view of a store's job, as served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub store_id: Uuid,
    pub job_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobSnapshot {
    fn not_started(store_id: Uuid) -> Self {
        Self {
            store_id,
            job_id: None,
            started_at: None,
            finished_at: None,
            state: JobState::NotStarted,
        }
    }

    /// Mean camera progress while processing.
    #[must_use]
    pub fn overall_progress(&self) -> Option<f64> {
        match &self.state {
            JobState::Processing { progress, .. } if !progress.is_empty() => {
                #[allow(clippy::cast_precision_loss)]
                let count = progress.len() as f64;
                Some(progress.values().map(|c| c.progress).sum::<f64>() / count)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ProcessingJob {
    job_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    state: JobState,
    finalizing: bool,
}

impl ProcessingJob {
    fn snapshot(&self, store_id: Uuid) -> JobSnapshot {
        JobSnapshot {
            store_id,
            job_id: Some(self.job_id),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
            state: self.state.clone(),
        }
    }

    fn mark_completed(&mut self, store_id: Uuid, summary: JobSummary) -> JobSnapshot {
        self.state = JobState::Completed {
            result: summary,
            message: "Processing completed successfully".to_string(),
        };
        self.finished_at = Some(Utc::now());
        self.finalizing = false;
        tracing::info!(
            %store_id,
            job_id = %self.job_id,
            hourly = summary.hourly_heatmaps,
            daily = summary.daily_heatmaps,
            insights = summary.insights_generated,
            "processing job completed"
        );
        self.snapshot(store_id)
    }

    fn mark_failed(&mut self, store_id: Uuid, message: String) -> JobSnapshot {
        tracing::warn!(%store_id, job_id = %self.job_id, error = %message, "processing job failed");
        self.state = JobState::Error { message };
        self.finished_at = Some(Utc::now());
        self.finalizing = false;
        self.snapshot(store_id)
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, ProcessingJob>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a job for `store_id` with every camera at 0%.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyProcessing`] when a job for the store is still
    /// processing, [`CoreError::NoCameras`] when `cameras` is empty.
    pub fn start(
        &self,
        store_id: Uuid,
        cameras: &[(Uuid, String)],
    ) -> Result<JobSnapshot, CoreError> {
        if cameras.is_empty() {
            return Err(CoreError::NoCameras(store_id));
        }

        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = jobs.get(&store_id) {
            if matches!(existing.state, JobState::Processing { .. }) {
                return Err(CoreError::AlreadyProcessing(store_id));
            }
        }

        let progress = cameras
            .iter()
            .map(|(id, name)| {
                (
                    *id,
                    CameraProgress {
                        name: name.clone(),
                        progress: 0.0,
                    },
                )
            })
            .collect();
        let job = ProcessingJob {
            job_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            state: JobState::Processing {
                progress,
                message: "Processing started".to_string(),
            },
            finalizing: false,
        };
        let snapshot = job.snapshot(store_id);
        tracing::info!(
            %store_id,
            job_id = %job.job_id,
            cameras = cameras.len(),
            "processing job started"
        );
        jobs.insert(store_id, job);
        Ok(snapshot)
    }

    /// Current state for `store_id`; `not_started` when no job ever ran.
    #[must_use]
    pub fn status(&self, store_id: Uuid) -> JobSnapshot {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&store_id).map_or_else(
            || JobSnapshot::not_started(store_id),
            |job| job.snapshot(store_id),
        )
    }

    /// Replaces the progress map of a processing job.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidProgress`] for values outside `[0, 100]`,
    /// [`CoreError::ProgressRegressed`] when a camera's value goes down, and
    /// the transition errors of [`Self::complete`].
    pub fn update_progress(
        &self,
        store_id: Uuid,
        job_id: Uuid,
        progress: BTreeMap<Uuid, CameraProgress>,
    ) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = processing_job(&mut jobs, store_id, job_id, "update progress")?;

        let state = job.state.name();
        let JobState::Processing {
            progress: current, ..
        } = &mut job.state
        else {
            return Err(CoreError::InvalidTransition {
                store_id,
                job_id,
                action: "update progress",
                state,
            });
        };

        for (camera_id, reported) in &progress {
            if !(0.0..=100.0).contains(&reported.progress) {
                return Err(CoreError::InvalidProgress {
                    camera_id: *camera_id,
                    reported: reported.progress,
                });
            }
            if let Some(previous) = current.get(camera_id) {
                if reported.progress < previous.progress {
                    return Err(CoreError::ProgressRegressed {
                        camera_id: *camera_id,
                        previous: previous.progress,
                        reported: reported.progress,
                    });
                }
            }
        }

        tracing::debug!(%store_id, %job_id, cameras = progress.len(), "progress updated");
        *current = progress;
        Ok(job.snapshot(store_id))
    }

    /// Moves a processing job to `completed`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] when the store has no job and
    /// [`CoreError::InvalidTransition`] when `job_id` is stale, the job is
    /// no longer processing, or its results are being finalized.
    pub fn complete(
        &self,
        store_id: Uuid,
        job_id: Uuid,
        summary: JobSummary,
    ) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = processing_job(&mut jobs, store_id, job_id, "complete")?;
        Ok(job.mark_completed(store_id, summary))
    }

    /// Moves a processing job to `error`. The store may be started again.
    ///
    /// # Errors
    ///
    /// Same transition errors as [`Self::complete`].
    pub fn fail(
        &self,
        store_id: Uuid,
        job_id: Uuid,
        message: impl Into<String>,
    ) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = processing_job(&mut jobs, store_id, job_id, "fail")?;
        Ok(job.mark_failed(store_id, message.into()))
    }

    /// Claims a processing job for persisting its results.
    ///
    /// Exactly one caller wins the claim; it must end it with
    /// [`Self::finish_finalize`] or [`Self::abort_finalize`].
    ///
    /// # Errors
    ///
    /// Same transition errors as [`Self::complete`]; a job that is already
    /// claimed reports the state `finalizing`.
    pub fn begin_finalize(&self, store_id: Uuid, job_id: Uuid) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = processing_job(&mut jobs, store_id, job_id, "finalize")?;
        job.finalizing = true;
        if let JobState::Processing { message, .. } = &mut job.state {
            *message = "Storing results".to_string();
        }
        tracing::debug!(%store_id, %job_id, "finalize claimed");
        Ok(job.snapshot(store_id))
    }

    /// Completes a job claimed with [`Self::begin_finalize`].
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransition`] when the job is not claimed.
    pub fn finish_finalize(
        &self,
        store_id: Uuid,
        job_id: Uuid,
        summary: JobSummary,
    ) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = finalizing_job(&mut jobs, store_id, job_id, "finish finalize")?;
        Ok(job.mark_completed(store_id, summary))
    }

    /// Fails a job claimed with [`Self::begin_finalize`].
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidTransition`] when the job is not claimed.
    pub fn abort_finalize(
        &self,
        store_id: Uuid,
        job_id: Uuid,
        message: impl Into<String>,
    ) -> Result<JobSnapshot, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = finalizing_job(&mut jobs, store_id, job_id, "abort finalize")?;
        Ok(job.mark_failed(store_id, message.into()))
    }
}

/// The job for `store_id` if it is `job_id`, still processing, and its
/// finalize claim matches `finalizing`.
fn claimable_job<'a>(
    jobs: &'a mut HashMap<Uuid, ProcessingJob>,
    store_id: Uuid,
    job_id: Uuid,
    action: &'static str,
    finalizing: bool,
) -> Result<&'a mut ProcessingJob, CoreError> {
    let job = jobs
        .get_mut(&store_id)
        .ok_or_else(|| CoreError::not_found("job", job_id))?;
    let state = if job.job_id != job_id {
        Some("superseded")
    } else if !matches!(job.state, JobState::Processing { .. }) {
        Some(job.state.name())
    } else if job.finalizing != finalizing {
        Some(if job.finalizing {
            "finalizing"
        } else {
            "not finalizing"
        })
    } else {
        None
    };
    match state {
        Some(state) => Err(CoreError::InvalidTransition {
            store_id,
            job_id,
            action,
            state,
        }),
        None => Ok(job),
    }
}

fn processing_job<'a>(
    jobs: &'a mut HashMap<Uuid, ProcessingJob>,
    store_id: Uuid,
    job_id: Uuid,
    action: &'static str,
) -> Result<&'a mut ProcessingJob, CoreError> {
    claimable_job(jobs, store_id, job_id, action, false)
}

fn finalizing_job<'a>(
    jobs: &'a mut HashMap<Uuid, ProcessingJob>,
    store_id: Uuid,
    job_id: Uuid,
    action: &'static str,
) -> Result<&'a mut ProcessingJob, CoreError> {
    claimable_job(jobs, store_id, job_id, action, true)
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
