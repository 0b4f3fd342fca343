//! Customer profile storage: the indexed equivalence search, reference
//! checks, and the cursors used by the partner export and dedup jobs.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::types::Json;
use sqlx::PgPool;

use dcsync_core::{Address, ProfileOwner, ProfileRecord};

use crate::{CursorSnapshot, DbError};

const PROFILE_COLUMNS: &str = "id, owner_uid, owner_session, bundle, is_active, phone, \
                               country_code, administrative_area, locality, postal_code, \
                               address_line1, address_line2, organization, given_name, \
                               family_name, extra";

/// Active profiles with no up-to-date `res.partner` mapping.
const PENDING_EXPORT_FILTER: &str = "\
    FROM profiles p \
    LEFT JOIN entity_mappings m \
           ON m.entity_type = 'profile' \
          AND m.entity_id = p.id \
          AND m.remote_model = 'res.partner' \
    WHERE p.is_active \
      AND p.bundle = 'customer' \
      AND (m.id IS NULL \
           OR m.sync_status <> 'synced' \
           OR m.synced_at IS NULL \
           OR p.updated_at > m.synced_at)";

/// True when any order, payment method or shipment points at the profile
/// whose id expression is `id`.
fn references_clause(id: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM orders o \
                 WHERE o.billing_profile_id = {id} OR o.shipping_profile_id = {id}) \
         OR EXISTS (SELECT 1 FROM payment_methods pm WHERE pm.billing_profile_id = {id}) \
         OR EXISTS (SELECT 1 FROM shipments s WHERE s.shipping_profile_id = {id})"
    )
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    owner_uid: i64,
    owner_session: Option<String>,
    bundle: String,
    is_active: bool,
    phone: String,
    country_code: String,
    administrative_area: String,
    locality: String,
    postal_code: String,
    address_line1: String,
    address_line2: String,
    organization: String,
    given_name: String,
    family_name: String,
    extra: Json<BTreeMap<String, Vec<String>>>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        let owner = if row.owner_uid > 0 {
            ProfileOwner::User(row.owner_uid)
        } else {
            ProfileOwner::Session(row.owner_session.unwrap_or_default())
        };

        Self {
            id: Some(row.id),
            owner,
            bundle: row.bundle,
            is_active: row.is_active,
            phone: row.phone,
            address: Address {
                country_code: row.country_code,
                administrative_area: row.administrative_area,
                locality: row.locality,
                postal_code: row.postal_code,
                address_line1: row.address_line1,
                address_line2: row.address_line2,
                organization: row.organization,
                given_name: row.given_name,
                family_name: row.family_name,
            },
            extra: row.extra.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_profile(pool: &PgPool, id: i64) -> Result<Option<ProfileRecord>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ProfileRecord::from))
}

/// Profiles equivalent to `candidate`, in ascending id order.
///
/// Bundle, active flag, owner and phone must match exactly. Every address
/// column is compared (case-sensitive) only when the candidate carries an
/// address. With `exclude_self`, a persisted candidate never matches its own
/// row. No match is an empty vector, not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_equivalent_profiles(
    pool: &PgPool,
    candidate: &ProfileRecord,
    exclude_self: bool,
) -> Result<Vec<ProfileRecord>, DbError> {
    let excluded_id = if exclude_self { candidate.id } else { None };
    let address = &candidate.address;

    let rows = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles \
         WHERE bundle = $1 \
           AND is_active = $2 \
           AND owner_uid = $3 \
           AND owner_session IS NOT DISTINCT FROM $4 \
           AND phone = $5 \
           AND ($6::bigint IS NULL OR id <> $6) \
           AND ($7 OR (country_code = $8 \
                       AND administrative_area = $9 \
                       AND locality = $10 \
                       AND postal_code = $11 \
                       AND address_line1 = $12 \
                       AND address_line2 = $13 \
                       AND organization = $14 \
                       AND given_name = $15 \
                       AND family_name = $16)) \
         ORDER BY id"
    ))
    .bind(&candidate.bundle)
    .bind(candidate.is_active)
    .bind(candidate.owner.uid())
    .bind(candidate.owner.session_id())
    .bind(&candidate.phone)
    .bind(excluded_id)
    .bind(address.is_empty())
    .bind(&address.country_code)
    .bind(&address.administrative_area)
    .bind(&address.locality)
    .bind(&address.postal_code)
    .bind(&address.address_line1)
    .bind(&address.address_line2)
    .bind(&address.organization)
    .bind(&address.given_name)
    .bind(&address.family_name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProfileRecord::from).collect())
}

/// Whether a placed (non-draft, non-cart) order uses the profile for billing
/// or shipping.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_referenced_by_placed_order(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let referenced = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM orders \
             WHERE (billing_profile_id = $1 OR shipping_profile_id = $1) \
               AND state <> 'draft' \
               AND NOT is_cart)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(referenced)
}

/// The subset of `ids` referenced by any order, payment method or shipment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn referenced_profile_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<BTreeSet<i64>, DbError> {
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }

    let referenced = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT p.id FROM UNNEST($1::bigint[]) AS p(id) \
         WHERE {}",
        references_clause("p.id")
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(referenced.into_iter().collect())
}

/// Email to put on the exported partner.
///
/// An `email` entry in the profile's extra fields wins; otherwise the email of
/// the most recent order billed to the profile is used.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn contact_email(pool: &PgPool, profile: &ProfileRecord) -> Result<Option<String>, DbError> {
    if let Some(email) = profile
        .extra
        .get("email")
        .and_then(|values| values.first())
        .filter(|e| !e.is_empty())
    {
        return Ok(Some(email.clone()));
    }

    let Some(id) = profile.id else {
        return Ok(None);
    };

    let email = sqlx::query_scalar::<_, Option<String>>(
        "SELECT email FROM orders \
         WHERE billing_profile_id = $1 AND email IS NOT NULL AND email <> '' \
         ORDER BY placed_at DESC NULLS LAST, id DESC \
         LIMIT 1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(email.flatten())
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a new profile and returns its id. `profile.id` is ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_profile(pool: &PgPool, profile: &ProfileRecord) -> Result<i64, DbError> {
    let address = &profile.address;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO profiles \
             (owner_uid, owner_session, bundle, is_active, phone, \
              country_code, administrative_area, locality, postal_code, \
              address_line1, address_line2, organization, given_name, family_name, extra) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING id",
    )
    .bind(profile.owner.uid())
    .bind(profile.owner.session_id())
    .bind(&profile.bundle)
    .bind(profile.is_active)
    .bind(&profile.phone)
    .bind(&address.country_code)
    .bind(&address.administrative_area)
    .bind(&address.locality)
    .bind(&address.postal_code)
    .bind(&address.address_line1)
    .bind(&address.address_line2)
    .bind(&address.organization)
    .bind(&address.given_name)
    .bind(&address.family_name)
    .bind(Json(&profile.extra))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Overwrites every field of profile `id` and bumps `updated_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no profile has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_profile(pool: &PgPool, id: i64, profile: &ProfileRecord) -> Result<(), DbError> {
    let address = &profile.address;

    let result = sqlx::query(
        "UPDATE profiles SET \
             owner_uid = $2, owner_session = $3, bundle = $4, is_active = $5, phone = $6, \
             country_code = $7, administrative_area = $8, locality = $9, postal_code = $10, \
             address_line1 = $11, address_line2 = $12, organization = $13, \
             given_name = $14, family_name = $15, extra = $16, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(profile.owner.uid())
    .bind(profile.owner.session_id())
    .bind(&profile.bundle)
    .bind(profile.is_active)
    .bind(&profile.phone)
    .bind(&address.country_code)
    .bind(&address.administrative_area)
    .bind(&address.locality)
    .bind(&address.postal_code)
    .bind(&address.address_line1)
    .bind(&address.address_line2)
    .bind(&address.organization)
    .bind(&address.given_name)
    .bind(&address.family_name)
    .bind(Json(&profile.extra))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Deactivates the given profiles, skipping any that are still referenced.
///
/// Returns the ids actually deactivated, ascending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_profiles(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut deactivated = sqlx::query_scalar::<_, i64>(&format!(
        "UPDATE profiles p SET is_active = FALSE, updated_at = NOW() \
         WHERE p.id = ANY($1) \
           AND p.is_active \
           AND NOT ({}) \
         RETURNING p.id",
        references_clause("p.id")
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    deactivated.sort_unstable();
    Ok(deactivated)
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn profile_export_snapshot(pool: &PgPool) -> Result<CursorSnapshot, DbError> {
    let snapshot = sqlx::query_as::<_, CursorSnapshot>(&format!(
        "SELECT COUNT(*) AS total, MAX(p.id) AS max_id {PENDING_EXPORT_FILTER}"
    ))
    .fetch_one(pool)
    .await?;

    Ok(snapshot)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_profile_ids_pending_export(
    pool: &PgPool,
    after_id: i64,
    max_id: i64,
    limit: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT p.id {PENDING_EXPORT_FILTER} \
           AND p.id > $1 AND p.id <= $2 \
         ORDER BY p.id \
         LIMIT $3"
    ))
    .bind(after_id)
    .bind(max_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn active_profile_snapshot(pool: &PgPool) -> Result<CursorSnapshot, DbError> {
    let snapshot = sqlx::query_as::<_, CursorSnapshot>(
        "SELECT COUNT(*) AS total, MAX(id) AS max_id FROM profiles WHERE is_active",
    )
    .fetch_one(pool)
    .await?;

    Ok(snapshot)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_profile_ids(
    pool: &PgPool,
    after_id: i64,
    max_id: i64,
    limit: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM profiles \
         WHERE is_active AND id > $1 AND id <= $2 \
         ORDER BY id \
         LIMIT $3",
    )
    .bind(after_id)
    .bind(max_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(owner_uid: i64, owner_session: Option<&str>) -> ProfileRow {
        ProfileRow {
            id: 7,
            owner_uid,
            owner_session: owner_session.map(str::to_string),
            bundle: "customer".to_string(),
            is_active: true,
            phone: "555-1234".to_string(),
            country_code: "US".to_string(),
            administrative_area: "CO".to_string(),
            locality: "Denver".to_string(),
            postal_code: "80202".to_string(),
            address_line1: "1600 Market St".to_string(),
            address_line2: String::new(),
            organization: String::new(),
            given_name: "Dana".to_string(),
            family_name: "Reyes".to_string(),
            extra: Json(BTreeMap::new()),
        }
    }

    #[test]
    fn registered_owner_maps_to_user() {
        let profile = ProfileRecord::from(row(10, None));
        assert_eq!(profile.id, Some(7));
        assert_eq!(profile.owner, ProfileOwner::User(10));
        assert_eq!(profile.address.locality, "Denver");
    }

    #[test]
    fn anonymous_owner_maps_to_session() {
        let profile = ProfileRecord::from(row(0, Some("sess-1")));
        assert_eq!(profile.owner, ProfileOwner::Session("sess-1".to_string()));
    }

    #[test]
    fn references_clause_checks_every_referencing_table() {
        let clause = references_clause("p.id");
        assert!(clause.contains("orders"));
        assert!(clause.contains("payment_methods"));
        assert!(clause.contains("shipments"));
    }
}
