use std::net::SocketAddr;

use crate::geometry::CanvasSize;
use crate::insights::InsightsConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Drawing surface the zone editor presents, in canvas pixels.
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub quick_browse_threshold_secs: f64,
    pub default_min_dwell_secs: u32,
    pub poll_interval_ms: u64,
    pub client_max_retries: u32,
    pub client_retry_backoff_base_ms: u64,
    pub client_request_timeout_secs: u64,
}

impl AppConfig {
    #[must_use]
    pub fn canvas_size(&self) -> CanvasSize {
        CanvasSize {
            width: f64::from(self.canvas_width),
            height: f64::from(self.canvas_height),
        }
    }

    #[must_use]
    pub fn insights_config(&self) -> InsightsConfig {
        InsightsConfig {
            quick_browse_threshold_secs: self.quick_browse_threshold_secs,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("canvas_width", &self.canvas_width)
            .field("canvas_height", &self.canvas_height)
            .field(
                "quick_browse_threshold_secs",
                &self.quick_browse_threshold_secs,
            )
            .field("default_min_dwell_secs", &self.default_min_dwell_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("client_max_retries", &self.client_max_retries)
            .field(
                "client_retry_backoff_base_ms",
                &self.client_retry_backoff_base_ms,
            )
            .field(
                "client_request_timeout_secs",
                &self.client_request_timeout_secs,
            )
            .finish()
    }
}
