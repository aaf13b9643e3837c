use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`crate::HeatmapClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with its error envelope.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Transient failures persisted past the retry budget.
    #[error("service unavailable after {attempts} attempts: {source}")]
    UpstreamUnavailable {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// The watched job ended in the error state.
    #[error("processing failed: {0}")]
    JobFailed(String),

    /// There is no job to watch for this store.
    #[error("no processing job has been started for store {0}")]
    NoJob(Uuid),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
