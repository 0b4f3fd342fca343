pub mod app_config;
pub mod batch;
pub mod config;
pub mod entities;
pub mod exceptions;
pub mod jobs;
pub mod orders;
pub mod profiles;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use batch::{BatchReport, BatchState};
pub use config::{load_app_config, load_app_config_from_env};
pub use entities::{EntityType, RemoteModel, SyncStatus, DEFAULT_EXPORT_TYPE};
pub use exceptions::SyncException;
pub use jobs::{load_sync_jobs, SyncJobConfig, SyncJobKind, SyncJobsFile};
pub use orders::{OrderItem, OrderRecord, OrderState};
pub use profiles::{find_equivalent, is_equivalent, profiles_equal, Address, ProfileOwner, ProfileRecord};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sync jobs file {path}: {source}")]
    JobsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sync jobs file: {0}")]
    JobsFileParse(#[from] serde_yaml::Error),

    #[error("sync jobs validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown remote model: {0}")]
    UnknownRemoteModel(String),

    #[error("unknown sync status: {0}")]
    UnknownSyncStatus(String),

    #[error("unknown order state: {0}")]
    UnknownOrderState(String),

    #[error("unknown sync job: {0}")]
    UnknownSyncJob(String),
}
