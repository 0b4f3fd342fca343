//! Commerce ↔ Odoo sync engine: exporters, the partner importer, profile
//! dedupe, and the re-entrant batch driver that runs them.

pub mod batch;
pub mod error;
pub mod export;
pub mod import;
pub mod invoice;
pub mod jobs;
pub mod orchestrator;
pub mod profiles;
pub mod runner;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{run_batch, BatchSource};
pub use error::SyncError;
pub use import::{import_partner, MigrationContext};
pub use jobs::{run_invocation, source_for};
pub use orchestrator::{
    export_entity, mark_entity_error, EntityOutcome, ExportPlan, SyncContext, SyncSettings,
};
pub use profiles::{dedupe_profile, save_customer_profile, update_profile, ProfileUpdate};
pub use runner::{JobRunner, RunOutcome};
pub use store::{CommerceStore, IdentityStore, LocalCursor, PgStore, Store};
