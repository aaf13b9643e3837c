use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::str::FromStr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    }

    let positive_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let value = parse_as::<u32>(var, &or_default(var, default))?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("HEATMAP_ENV", "development"))?;

    let bind_addr =
        parse_as::<SocketAddr>("HEATMAP_BIND_ADDR", &or_default("HEATMAP_BIND_ADDR", "0.0.0.0:3000"))?;
    let log_level = or_default("HEATMAP_LOG_LEVEL", "info");

    let db_max_connections = parse_as::<u32>(
        "HEATMAP_DB_MAX_CONNECTIONS",
        &or_default("HEATMAP_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections = parse_as::<u32>(
        "HEATMAP_DB_MIN_CONNECTIONS",
        &or_default("HEATMAP_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs = parse_as::<u64>(
        "HEATMAP_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("HEATMAP_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    let canvas_width = positive_u32("HEATMAP_CANVAS_WIDTH", "640")?;
    let canvas_height = positive_u32("HEATMAP_CANVAS_HEIGHT", "480")?;

    let quick_browse_threshold_secs = parse_as::<f64>(
        "HEATMAP_QUICK_BROWSE_THRESHOLD_SECS",
        &or_default("HEATMAP_QUICK_BROWSE_THRESHOLD_SECS", "10"),
    )?;
    if !quick_browse_threshold_secs.is_finite() || quick_browse_threshold_secs < 0.0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "HEATMAP_QUICK_BROWSE_THRESHOLD_SECS".to_string(),
            reason: "must be a non-negative number of seconds".to_string(),
        });
    }

    let default_min_dwell_secs = parse_as::<u32>(
        "HEATMAP_DEFAULT_MIN_DWELL_SECS",
        &or_default("HEATMAP_DEFAULT_MIN_DWELL_SECS", "5"),
    )?;

    let poll_interval_ms = parse_as::<u64>(
        "HEATMAP_POLL_INTERVAL_MS",
        &or_default("HEATMAP_POLL_INTERVAL_MS", "2000"),
    )?;
    let client_max_retries = parse_as::<u32>(
        "HEATMAP_CLIENT_MAX_RETRIES",
        &or_default("HEATMAP_CLIENT_MAX_RETRIES", "3"),
    )?;
    let client_retry_backoff_base_ms = parse_as::<u64>(
        "HEATMAP_CLIENT_RETRY_BACKOFF_BASE_MS",
        &or_default("HEATMAP_CLIENT_RETRY_BACKOFF_BASE_MS", "500"),
    )?;
    let client_request_timeout_secs = parse_as::<u64>(
        "HEATMAP_CLIENT_REQUEST_TIMEOUT_SECS",
        &or_default("HEATMAP_CLIENT_REQUEST_TIMEOUT_SECS", "30"),
    )?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        canvas_width,
        canvas_height,
        quick_browse_threshold_secs,
        default_min_dwell_secs,
        poll_interval_ms,
        client_max_retries,
        client_retry_backoff_base_ms,
        client_request_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HEATMAP_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
