use thiserror::Error;

use dcsync_core::{EntityType, SyncException, SyncJobKind};
use dcsync_db::DbError;
use dcsync_odoo::OdooError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Sync(#[from] SyncException),

    #[error(transparent)]
    Erp(#[from] OdooError),

    #[error(transparent)]
    Db(DbError),

    #[error("{entity_type} {entity_id} does not exist")]
    EntityNotFound {
        entity_type: EntityType,
        entity_id: i64,
    },

    #[error("job {job} needs an Odoo connection but none was configured")]
    ErpUnavailable { job: SyncJobKind },
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Lookup(exception) => Self::Sync(exception),
            other => Self::Db(other),
        }
    }
}

impl SyncError {
    /// Whether the failure belongs to one entity.
    ///
    /// Entity-scoped errors are recorded on that entity's mapping and the
    /// batch moves on. Anything else (database failures, rejected
    /// credentials, a missing ERP connection) aborts the invocation.
    #[must_use]
    pub fn is_entity_scoped(&self) -> bool {
        match self {
            Self::Sync(_) | Self::EntityNotFound { .. } => true,
            Self::Erp(err) => !matches!(err, OdooError::Auth { .. } | OdooError::InvalidUrl { .. }),
            Self::Db(_) | Self::ErpUnavailable { .. } => false,
        }
    }
}
