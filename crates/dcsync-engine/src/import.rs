//! Odoo `res.partner` → local customer profiles.
//!
//! The running migration travels as an explicit [`MigrationContext`]; the
//! `migrate_map` rows it writes are what later lets the partner exporter adopt
//! imported partners instead of creating them again.

use dcsync_core::{Address, EntityType, ProfileOwner, ProfileRecord, RemoteModel};
use dcsync_odoo::erp::{many2one_id, string_field};
use dcsync_odoo::{ErpClient, Record};

use crate::error::SyncError;
use crate::orchestrator::EntityOutcome;
use crate::profiles::{save_customer_profile, update_profile, ProfileUpdate};
use crate::store::Store;

/// Status written to `migrate_map.source_row_status` for imported rows.
const IMPORTED: &str = "imported";

/// Fields read from `res.partner`.
pub const PARTNER_FIELDS: [&str; 12] = [
    "id",
    "name",
    "ref",
    "street",
    "street2",
    "city",
    "zip",
    "phone",
    "email",
    "company_name",
    "country_id",
    "state_id",
];

/// Identifies one import migration and the pair it maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    pub migration_id: String,
    pub entity_type: EntityType,
    pub remote_model: RemoteModel,
}

impl MigrationContext {
    /// The customer partner import.
    #[must_use]
    pub fn odoo_partners() -> Self {
        Self {
            migration_id: "odoo_partner".to_string(),
            entity_type: EntityType::Profile,
            remote_model: RemoteModel::ResPartner,
        }
    }
}

/// Local profile values for a partner record.
///
/// A numeric `ref` is taken as the customer uid; other partners become
/// anonymous profiles keyed by partner id. The name is split into given and
/// family name at the first space.
#[must_use]
pub fn profile_from_partner(
    partner_id: i64,
    partner: &Record,
    country_code: Option<&str>,
    state_code: Option<&str>,
) -> ProfileRecord {
    let owner = string_field(partner, "ref")
        .and_then(|r| r.trim().parse::<i64>().ok())
        .filter(|uid| *uid > 0)
        .map_or_else(
            || ProfileOwner::Session(format!("odoo-partner-{partner_id}")),
            ProfileOwner::User,
        );

    let text = |field: &str| string_field(partner, field).unwrap_or_default().to_string();
    let name = text("name");
    let (given_name, family_name) = match name.trim().split_once(' ') {
        Some((given, family)) => (given.to_string(), family.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    };

    let address = Address {
        country_code: country_code.unwrap_or_default().to_string(),
        administrative_area: state_code.unwrap_or_default().to_string(),
        locality: text("city"),
        postal_code: text("zip"),
        address_line1: text("street"),
        address_line2: text("street2"),
        organization: text("company_name"),
        given_name,
        family_name,
    };

    let mut profile = ProfileRecord::customer(owner, text("phone"), address);
    if let Some(email) = string_field(partner, "email").filter(|e| !e.is_empty()) {
        profile
            .extra
            .insert("email".to_string(), vec![email.to_string()]);
    }
    profile
}

/// `code` of the record a many2one field of `partner` points at.
async fn linked_code(
    erp: &dyn ErpClient,
    partner: &Record,
    field: &str,
    model: &str,
) -> Result<Option<String>, SyncError> {
    let Some(linked_id) = many2one_id(partner, field) else {
        return Ok(None);
    };
    let linked = erp.read(model, &[linked_id], &["code"]).await?;
    Ok(linked
        .first()
        .and_then(|r| string_field(r, "code"))
        .map(str::to_string))
}

/// Carries over the values of an already linked profile that the partner
/// does not hold, so re-reading a partner this service exported is a no-op.
///
/// - owner: kept unless the partner names a customer uid
/// - administrative area: kept when the partner has no state
/// - given/family split: kept while the joined name is unchanged
///
/// A partner email equal to the profile's contact email is not copied.
fn keep_local_fields(
    candidate: &mut ProfileRecord,
    existing: &ProfileRecord,
    contact_email: Option<&str>,
) {
    let email = candidate.extra.remove("email");
    candidate.extra = existing.extra.clone();
    match email {
        Some(values) if values.first().map(String::as_str) == contact_email => {}
        Some(values) => {
            candidate.extra.insert("email".to_string(), values);
        }
        None => {
            candidate.extra.remove("email");
        }
    }
    candidate.is_active = existing.is_active;

    if candidate.owner.uid() == 0 {
        candidate.owner = existing.owner.clone();
    }

    let address = &mut candidate.address;
    if address.administrative_area.is_empty() {
        address
            .administrative_area
            .clone_from(&existing.address.administrative_area);
    }
    if address.full_name() == existing.address.full_name() {
        address.given_name.clone_from(&existing.address.given_name);
        address.family_name.clone_from(&existing.address.family_name);
    }
}

/// Local profile previously linked to `partner_id`, if it still exists.
async fn mapped_profile(
    store: &dyn Store,
    migration: &MigrationContext,
    partner_id: i64,
) -> Result<Option<ProfileRecord>, SyncError> {
    let mut local_id = store
        .lookup_destination_id(&migration.migration_id, partner_id)
        .await?;
    if local_id.is_none() {
        local_id = store
            .lookup_local_id(migration.remote_model, partner_id)
            .await?;
    }
    match local_id {
        Some(id) => Ok(store.get_profile(id).await?),
        None => Ok(None),
    }
}

/// Imports one partner.
///
/// Mapped partners update their profile (a no-op when nothing changed, a new
/// profile revision when the old one is referenced by a placed order). Values
/// Odoo does not hold are taken from the linked profile.
/// Unmapped partners are merged into an equivalent profile when one exists
/// and inserted otherwise. Either way the identity mapping and the migration
/// map end up pointing at the profile holding the partner's values.
///
/// # Errors
///
/// Returns [`SyncError`] on ERP, lookup or store failures.
pub async fn import_partner(
    store: &dyn Store,
    erp: &dyn ErpClient,
    migration: &MigrationContext,
    partner_id: i64,
    partner: &Record,
) -> Result<EntityOutcome, SyncError> {
    let country = linked_code(erp, partner, "country_id", "res.country").await?;
    let state = linked_code(erp, partner, "state_id", "res.country.state").await?;
    let mut candidate =
        profile_from_partner(partner_id, partner, country.as_deref(), state.as_deref());

    let (profile_id, outcome) = match mapped_profile(store, migration, partner_id).await? {
        Some(existing) => {
            let id = existing.id.ok_or(SyncError::EntityNotFound {
                entity_type: migration.entity_type,
                entity_id: partner_id,
            })?;
            let contact = store.contact_email(&existing).await?;
            keep_local_fields(&mut candidate, &existing, contact.as_deref());

            match update_profile(store, id, &candidate).await? {
                ProfileUpdate::Unchanged => (id, EntityOutcome::Unchanged(id)),
                ProfileUpdate::Updated => (id, EntityOutcome::Imported(id)),
                ProfileUpdate::Replaced { previous, current } => {
                    store
                        .delete_mapping(migration.entity_type, previous, migration.remote_model)
                        .await?;
                    (current, EntityOutcome::Imported(current))
                }
            }
        }
        None => {
            let (id, reused) = save_customer_profile(store, &candidate).await?;
            let outcome = if reused {
                EntityOutcome::Merged(id)
            } else {
                EntityOutcome::Imported(id)
            };
            (id, outcome)
        }
    };

    // A merged profile that already belongs to another partner keeps its link.
    let linked = store
        .lookup_remote_id(migration.entity_type, profile_id, migration.remote_model)
        .await?;
    if linked.is_none_or(|remote_id| remote_id == partner_id) {
        store
            .save_mapping(
                migration.entity_type,
                profile_id,
                migration.remote_model,
                partner_id,
            )
            .await?;
    }
    store
        .save_id_mapping(
            &migration.migration_id,
            migration.entity_type,
            migration.remote_model,
            partner_id,
            Some(profile_id),
            IMPORTED,
        )
        .await?;

    tracing::debug!(partner_id, profile_id, outcome = ?outcome, "imported partner");
    Ok(outcome)
}

#[cfg(test)]
#[path = "import_test.rs"]
mod tests;
