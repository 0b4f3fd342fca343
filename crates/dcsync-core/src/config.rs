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
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_optional_i64 = |var: &str| -> Result<Option<i64>, ConfigError> {
        match lookup(var) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| invalid(var, e.to_string())),
            Err(_) => Ok(None),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let odoo_url = require("ODOO_URL")?;
    let odoo_db = require("ODOO_DB")?;
    let odoo_username = require("ODOO_USERNAME")?;
    let odoo_password = require("ODOO_PASSWORD")?;

    let env = parse_environment(&or_default("DCSYNC_ENV", "development"));

    let bind_addr = parse_addr("DCSYNC_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("DCSYNC_LOG_LEVEL", "info");
    let jobs_path = PathBuf::from(or_default("DCSYNC_JOBS_PATH", "./config/sync_jobs.yaml"));

    let odoo_request_timeout_secs = parse_u64("DCSYNC_ODOO_REQUEST_TIMEOUT_SECS", "30")?;
    let odoo_max_retries = parse_u32("DCSYNC_ODOO_MAX_RETRIES", "3")?;
    let odoo_retry_backoff_base_ms = parse_u64("DCSYNC_ODOO_RETRY_BACKOFF_BASE_MS", "1000")?;
    let odoo_wholesale_pricelist_id = parse_optional_i64("ODOO_WHOLESALE_PRICELIST_ID")?;

    let db_max_connections = parse_u32("DCSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("DCSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("DCSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let sync_default_batch_size = parse_u32("DCSYNC_SYNC_BATCH_SIZE", "50")?;
    if sync_default_batch_size == 0 {
        return Err(invalid(
            "DCSYNC_SYNC_BATCH_SIZE",
            "batch size must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        jobs_path,
        odoo_url,
        odoo_db,
        odoo_username,
        odoo_password,
        odoo_request_timeout_secs,
        odoo_max_retries,
        odoo_retry_backoff_base_ms,
        odoo_wholesale_pricelist_id,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        sync_default_batch_size,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
