use std::net::SocketAddr;
use std::path::PathBuf;

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
    pub jobs_path: PathBuf,
    pub odoo_url: String,
    pub odoo_db: String,
    pub odoo_username: String,
    pub odoo_password: String,
    pub odoo_request_timeout_secs: u64,
    pub odoo_max_retries: u32,
    pub odoo_retry_backoff_base_ms: u64,
    /// Odoo pricelist applied to sale orders placed by wholesale customers.
    pub odoo_wholesale_pricelist_id: Option<i64>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub sync_default_batch_size: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("jobs_path", &self.jobs_path)
            .field("database_url", &"[redacted]")
            .field("odoo_url", &self.odoo_url)
            .field("odoo_db", &self.odoo_db)
            .field("odoo_username", &self.odoo_username)
            .field("odoo_password", &"[redacted]")
            .field("odoo_request_timeout_secs", &self.odoo_request_timeout_secs)
            .field("odoo_max_retries", &self.odoo_max_retries)
            .field("odoo_retry_backoff_base_ms", &self.odoo_retry_backoff_base_ms)
            .field(
                "odoo_wholesale_pricelist_id",
                &self.odoo_wholesale_pricelist_id,
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("sync_default_batch_size", &self.sync_default_batch_size)
            .finish()
    }
}
