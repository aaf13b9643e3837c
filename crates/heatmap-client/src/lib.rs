//! Typed HTTP client for the heatmap REST service.

mod client;
mod error;
mod poll;
mod retry;
mod types;

pub use client::{HeatmapClient, RetryPolicy};
pub use error::ClientError;
pub use poll::poll_until_terminal;
pub use types::{CameraSummary, InsightsReport, StoreSummary};
