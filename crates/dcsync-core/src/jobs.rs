//! Recurring sync job definitions, loaded from `config/sync_jobs.yaml`.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::{EntityType, RemoteModel};
use crate::{ConfigError, CoreError};

/// The closed set of batch jobs the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobKind {
    /// Customer profiles → `res.partner`.
    PartnerExport,
    /// Placed orders → `sale.order` (and cancellation of canceled ones).
    OrderExport,
    /// `res.partner` → customer profiles.
    PartnerImport,
    /// Deactivate duplicate, unreferenced customer profiles.
    ProfileDedupe,
}

impl SyncJobKind {
    pub const ALL: [Self; 4] = [
        Self::PartnerExport,
        Self::OrderExport,
        Self::PartnerImport,
        Self::ProfileDedupe,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartnerExport => "partner_export",
            Self::OrderExport => "order_export",
            Self::PartnerImport => "partner_import",
            Self::ProfileDedupe => "profile_dedupe",
        }
    }

    /// Local entity type the job's cursor walks over (or writes, for imports).
    #[must_use]
    pub const fn entity_type(self) -> EntityType {
        match self {
            Self::OrderExport => EntityType::CommerceOrder,
            Self::PartnerExport | Self::PartnerImport | Self::ProfileDedupe => {
                EntityType::Profile
            }
        }
    }

    #[must_use]
    pub const fn remote_model(self) -> Option<RemoteModel> {
        match self {
            Self::OrderExport => Some(RemoteModel::SaleOrder),
            Self::PartnerExport | Self::PartnerImport => Some(RemoteModel::ResPartner),
            Self::ProfileDedupe => None,
        }
    }

    /// Whether the job talks to Odoo at all.
    #[must_use]
    pub const fn needs_erp(self) -> bool {
        self.remote_model().is_some()
    }
}

impl std::fmt::Display for SyncJobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncJobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownSyncJob(s.to_string()))
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub kind: SyncJobKind,
    /// Six-field cron expression (seconds first).
    pub cron: String,
    pub batch_size: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncJobsFile {
    pub jobs: Vec<SyncJobConfig>,
}

impl SyncJobsFile {
    pub fn enabled(&self) -> impl Iterator<Item = &SyncJobConfig> {
        self.jobs.iter().filter(|j| j.enabled)
    }
}

/// Load and validate the sync job schedule from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sync_jobs(path: &Path) -> Result<SyncJobsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::JobsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_sync_jobs(&content)
}

/// Parse and validate a sync job schedule from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sync_jobs(content: &str) -> Result<SyncJobsFile, ConfigError> {
    let file: SyncJobsFile = serde_yaml::from_str(content)?;
    validate_sync_jobs(&file)?;
    Ok(file)
}

fn validate_sync_jobs(file: &SyncJobsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for job in &file.jobs {
        if !seen.insert(job.kind) {
            return Err(ConfigError::Validation(format!(
                "duplicate job: '{}'",
                job.kind
            )));
        }

        let fields = job.cron.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(ConfigError::Validation(format!(
                "job '{}' has cron '{}' with {fields} fields; expected 6 (sec min hour dom mon dow)",
                job.kind, job.cron
            )));
        }

        if job.batch_size == Some(0) {
            return Err(ConfigError::Validation(format!(
                "job '{}' has batch_size 0; must be at least 1",
                job.kind
            )));
        }
    }

    Ok(())
}
