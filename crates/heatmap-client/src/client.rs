//! HTTP client for the heatmap REST service.
//!
//! Every response is unwrapped from the `{ data, meta }` envelope; error
//! envelopes surface as [`ClientError::Api`]. Reads go through bounded
//! retry, writes are sent once.

use std::time::Duration;

use chrono::NaiveDate;
use heatmap_core::{Classified, DailyHeatmap, HourlyHeatmap, JobSnapshot};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ClientError;
use crate::retry::retry_with_backoff;
use crate::types::{CameraSummary, Envelope, ErrorEnvelope, InsightsReport, StoreSummary};

/// Retry budget for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Client for the heatmap REST API.
pub struct HeatmapClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HeatmapClient {
    /// Creates a client for the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("heatmap-client/0.1")
            .build()?;

        // Exactly one trailing slash so relative joins append to the path.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Lists all stores.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list_stores(&self) -> Result<Vec<StoreSummary>, ClientError> {
        self.get(&["api", "v1", "stores"], &[]).await
    }

    /// Lists a store's cameras.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list_cameras(&self, store_id: Uuid) -> Result<Vec<CameraSummary>, ClientError> {
        let store = store_id.to_string();
        self.get(&["api", "v1", "stores", &store, "cameras"], &[])
            .await
    }

    /// Starts a processing job for the store.
    ///
    /// # Errors
    ///
    /// [`ClientError::Api`] with code `already_processing` while a job is
    /// running, or `validation_error` when the store has no active cameras.
    pub async fn start_processing(&self, store_id: Uuid) -> Result<JobSnapshot, ClientError> {
        let store = store_id.to_string();
        let url = self.build_url(&["api", "v1", "stores", &store, "process"], &[]);
        self.send_once(Method::POST, url).await
    }

    /// Reads the store's current job status.
    ///
    /// # Errors
    ///
    /// See [`ClientError`]; transient failures are retried first.
    pub async fn processing_status(&self, store_id: Uuid) -> Result<JobSnapshot, ClientError> {
        let store = store_id.to_string();
        self.get(&["api", "v1", "stores", &store, "processing-status"], &[])
            .await
    }

    /// Classified hourly heatmaps, optionally for one camera.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn hourly_heatmaps(
        &self,
        store_id: Uuid,
        camera_id: Option<Uuid>,
    ) -> Result<Vec<Classified<HourlyHeatmap>>, ClientError> {
        let store = store_id.to_string();
        let camera = camera_id.map(|c| c.to_string());
        let query: Vec<(&str, &str)> = camera.iter().map(|c| ("camera_id", c.as_str())).collect();
        self.get(&["api", "v1", "stores", &store, "heatmaps", "hourly"], &query)
            .await
    }

    /// Classified daily heatmaps, optionally for one camera.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn daily_heatmaps(
        &self,
        store_id: Uuid,
        camera_id: Option<Uuid>,
    ) -> Result<Vec<Classified<DailyHeatmap>>, ClientError> {
        let store = store_id.to_string();
        let camera = camera_id.map(|c| c.to_string());
        let query: Vec<(&str, &str)> = camera.iter().map(|c| ("camera_id", c.as_str())).collect();
        self.get(&["api", "v1", "stores", &store, "heatmaps", "daily"], &query)
            .await
    }

    /// Daily insights, newest first, or just `date` when given.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn insights(
        &self,
        store_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<InsightsReport>, ClientError> {
        let store = store_id.to_string();
        let date = date.map(|d| d.to_string());
        let query: Vec<(&str, &str)> = date.iter().map(|d| ("date", d.as_str())).collect();
        self.get(&["api", "v1", "stores", &store, "insights"], &query)
            .await
    }

    /// Joins path segments onto the base URL and appends encoded query pairs.
    fn build_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = self.build_url(segments, query);
        retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.send_once(Method::GET, url.clone())
        })
        .await
    }

    /// Sends one request and unwraps the envelope.
    async fn send_once<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, ClientError> {
        tracing::debug!(%method, %url, "heatmap request");
        let response = self.client.request(method, url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorEnvelope>(&body) {
                Ok(envelope) => ClientError::Api {
                    status: status.as_u16(),
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => ClientError::Api {
                    status: status.as_u16(),
                    code: "http_error".to_owned(),
                    message: String::from_utf8_lossy(&body).chars().take(200).collect(),
                },
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| ClientError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
