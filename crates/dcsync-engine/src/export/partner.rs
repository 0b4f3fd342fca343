//! Customer profiles → `res.partner`.
//!
//! Equivalent profiles (same owner, phone and address) share one partner:
//! only the first exported profile holds the identity mapping, the others are
//! marked `synced` without a remote id and resolve to that partner.

use std::collections::BTreeMap;

use serde_json::Value;

use dcsync_core::{
    EntityType, ProfileRecord, RemoteModel, SyncJobKind, SyncStatus, DEFAULT_EXPORT_TYPE,
};
use dcsync_odoo::{Domain, ErpClient, Record, SearchOptions};

use crate::error::SyncError;
use crate::orchestrator::{export_entity, EntityOutcome, ExportPlan, SyncContext};
use crate::store::Store;

const CUSTOMER_BUNDLE: &str = "customer";

fn text(value: &str) -> Value {
    if value.is_empty() {
        Value::Bool(false)
    } else {
        Value::from(value)
    }
}

/// Display name sent to Odoo.
fn partner_name(profile: &ProfileRecord) -> String {
    let full_name = profile.address.full_name();
    if !full_name.is_empty() {
        return full_name;
    }
    if !profile.address.organization.is_empty() {
        return profile.address.organization.clone();
    }
    match profile.id {
        Some(id) => format!("Customer {id}"),
        None => "Customer".to_string(),
    }
}

async fn country_id(erp: &dyn ErpClient, code: &str) -> Result<Option<i64>, SyncError> {
    if code.is_empty() {
        return Ok(None);
    }
    let hits = erp
        .search_with(
            "res.country",
            &Domain::new().eq("code", code),
            &SearchOptions::limit(1),
        )
        .await?;
    Ok(hits.first().copied())
}

async fn state_id(
    erp: &dyn ErpClient,
    country_id: Option<i64>,
    code: &str,
) -> Result<Option<i64>, SyncError> {
    let Some(country_id) = country_id.filter(|_| !code.is_empty()) else {
        return Ok(None);
    };
    let hits = erp
        .search_with(
            "res.country.state",
            &Domain::new().eq("code", code).eq("country_id", country_id),
            &SearchOptions::limit(1),
        )
        .await?;
    Ok(hits.first().copied())
}

/// `res.partner` values for `profile`.
///
/// # Errors
///
/// Returns [`SyncError`] when the contact email, country or state cannot be
/// looked up.
pub async fn partner_values(
    store: &dyn Store,
    erp: &dyn ErpClient,
    profile: &ProfileRecord,
) -> Result<Record, SyncError> {
    let address = &profile.address;
    let email = store.contact_email(profile).await?;

    let mut values = Record::new();
    values.insert("name".to_string(), Value::from(partner_name(profile)));
    values.insert("street".to_string(), text(&address.address_line1));
    values.insert("street2".to_string(), text(&address.address_line2));
    values.insert("city".to_string(), text(&address.locality));
    values.insert("zip".to_string(), text(&address.postal_code));
    values.insert("phone".to_string(), text(&profile.phone));
    values.insert("email".to_string(), text(email.as_deref().unwrap_or_default()));
    values.insert("company_name".to_string(), text(&address.organization));
    let country = country_id(erp, &address.country_code).await?;
    let state = state_id(erp, country, &address.administrative_area).await?;
    values.insert(
        "country_id".to_string(),
        country.map_or(Value::Bool(false), Value::from),
    );
    values.insert(
        "state_id".to_string(),
        state.map_or(Value::Bool(false), Value::from),
    );
    if profile.owner.uid() > 0 {
        values.insert("ref".to_string(), Value::from(profile.owner.uid().to_string()));
    }
    Ok(values)
}

/// Partner already linked to a profile equivalent to `profile`.
async fn shared_partner(
    store: &dyn Store,
    profile: &ProfileRecord,
) -> Result<Option<i64>, SyncError> {
    for other in store.find_equivalent_profiles(profile, true).await? {
        let Some(other_id) = other.id else { continue };
        if let Some(remote_id) = store
            .lookup_remote_id(EntityType::Profile, other_id, RemoteModel::ResPartner)
            .await?
        {
            return Ok(Some(remote_id));
        }
    }
    Ok(None)
}

async fn sync_partner(
    store: &dyn Store,
    erp: &dyn ErpClient,
    profile_id: i64,
    profile: &ProfileRecord,
) -> Result<EntityOutcome, SyncError> {
    let mapped = store
        .lookup_remote_id(EntityType::Profile, profile_id, RemoteModel::ResPartner)
        .await?
        .is_some();
    let imported = !mapped
        && store
            .lookup_odoo_ids(EntityType::Profile, RemoteModel::ResPartner, profile_id)
            .await?
            .is_some();

    if !mapped && !imported {
        if let Some(remote_id) = shared_partner(store, profile).await? {
            store
                .set_sync_status(
                    EntityType::Profile,
                    RemoteModel::ResPartner,
                    DEFAULT_EXPORT_TYPE,
                    &BTreeMap::from([(profile_id, None)]),
                    SyncStatus::Synced,
                )
                .await?;
            tracing::debug!(profile_id, remote_id, "sharing partner of an equivalent profile");
            return Ok(EntityOutcome::Shared(remote_id));
        }
    }

    let values = partner_values(store, erp, profile).await?;
    export_entity(
        store,
        erp,
        ExportPlan::new(EntityType::Profile, profile_id, RemoteModel::ResPartner, values),
    )
    .await
}

/// Exports one customer profile. Missing, inactive and non-customer
/// profiles are skipped.
///
/// # Errors
///
/// Returns [`SyncError`] on ERP, lookup or store failures.
pub async fn export_partner(
    ctx: &SyncContext<'_>,
    profile_id: i64,
) -> Result<EntityOutcome, SyncError> {
    let erp = ctx.erp(SyncJobKind::PartnerExport)?;
    let Some(profile) = ctx.store.get_profile(profile_id).await? else {
        return Ok(EntityOutcome::Skipped);
    };
    if !profile.is_active || profile.bundle != CUSTOMER_BUNDLE {
        return Ok(EntityOutcome::Skipped);
    }
    sync_partner(ctx.store, erp, profile_id, &profile).await
}

/// Partner id for a profile referenced by an order, exporting the profile
/// first when it has no partner yet.
///
/// # Errors
///
/// Returns [`SyncError::EntityNotFound`] when the profile does not exist.
pub async fn ensure_partner(
    store: &dyn Store,
    erp: &dyn ErpClient,
    profile_id: i64,
) -> Result<i64, SyncError> {
    if let Some(remote_id) = store
        .lookup_remote_id(EntityType::Profile, profile_id, RemoteModel::ResPartner)
        .await?
    {
        return Ok(remote_id);
    }

    let not_found = SyncError::EntityNotFound {
        entity_type: EntityType::Profile,
        entity_id: profile_id,
    };
    let Some(profile) = store.get_profile(profile_id).await? else {
        return Err(not_found);
    };
    sync_partner(store, erp, profile_id, &profile)
        .await?
        .remote_id()
        .ok_or(not_found)
}
