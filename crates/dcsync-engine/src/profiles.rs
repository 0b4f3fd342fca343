//! Local profile maintenance: reuse at checkout, copy-on-write updates and
//! duplicate deactivation.

use std::collections::BTreeSet;

use dcsync_core::{profiles_equal, EntityType, ProfileRecord};

use crate::error::SyncError;
use crate::orchestrator::EntityOutcome;
use crate::store::Store;

/// Result of [`update_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileUpdate {
    /// The new values equal the stored ones; nothing was written.
    Unchanged,
    /// The profile was updated in place.
    Updated,
    /// The profile is referenced by a placed order, so a new profile was
    /// inserted and the old one left untouched.
    Replaced { previous: i64, current: i64 },
}

impl ProfileUpdate {
    /// Id of the profile holding the new values.
    #[must_use]
    pub fn current_id(self, id: i64) -> i64 {
        match self {
            Self::Replaced { current, .. } => current,
            Self::Unchanged | Self::Updated => id,
        }
    }
}

/// Saves a checkout profile, reusing an equivalent one when it exists.
///
/// Returns the profile id and whether an existing profile was reused. With
/// several equivalents the lowest id wins.
///
/// # Errors
///
/// Returns [`SyncError::Db`] on store failures.
pub async fn save_customer_profile(
    store: &dyn Store,
    candidate: &ProfileRecord,
) -> Result<(i64, bool), SyncError> {
    let existing = store.find_equivalent_profiles(candidate, true).await?;
    if let Some(id) = existing.iter().filter_map(|p| p.id).min() {
        tracing::debug!(profile_id = id, "reusing equivalent profile");
        return Ok((id, true));
    }
    let id = store.insert_profile(candidate).await?;
    Ok((id, false))
}

/// Applies `new` to profile `id`.
///
/// # Errors
///
/// Returns [`SyncError::EntityNotFound`] when the profile does not exist, or
/// [`SyncError::Db`] on store failures.
pub async fn update_profile(
    store: &dyn Store,
    id: i64,
    new: &ProfileRecord,
) -> Result<ProfileUpdate, SyncError> {
    let existing = store
        .get_profile(id)
        .await?
        .ok_or(SyncError::EntityNotFound {
            entity_type: EntityType::Profile,
            entity_id: id,
        })?;

    if profiles_equal(&existing, new) {
        return Ok(ProfileUpdate::Unchanged);
    }

    if store.is_referenced_by_placed_order(id).await? {
        let current = store.insert_profile(new).await?;
        tracing::info!(previous = id, current, "profile referenced by a placed order; inserted a new revision");
        return Ok(ProfileUpdate::Replaced {
            previous: id,
            current,
        });
    }

    store.update_profile(id, new).await?;
    Ok(ProfileUpdate::Updated)
}

/// Deactivates the unreferenced duplicates of profile `id`.
///
/// The survivor is the lowest referenced profile of the group, or the lowest
/// id when none is referenced. Referenced profiles are never deactivated.
///
/// # Errors
///
/// Returns [`SyncError::Db`] on store failures.
pub async fn dedupe_profile(store: &dyn Store, id: i64) -> Result<EntityOutcome, SyncError> {
    let Some(profile) = store.get_profile(id).await? else {
        return Ok(EntityOutcome::Skipped);
    };
    if !profile.is_active {
        return Ok(EntityOutcome::Skipped);
    }

    let duplicates = store.find_equivalent_profiles(&profile, true).await?;
    if duplicates.is_empty() {
        return Ok(EntityOutcome::Unchanged(id));
    }

    let group: BTreeSet<i64> = duplicates
        .iter()
        .filter_map(|p| p.id)
        .chain(std::iter::once(id))
        .collect();
    let group_ids: Vec<i64> = group.iter().copied().collect();
    let referenced = store.referenced_profile_ids(&group_ids).await?;

    let survivor = referenced
        .first()
        .or_else(|| group.first())
        .copied()
        .unwrap_or(id);
    let doomed: Vec<i64> = group
        .iter()
        .copied()
        .filter(|p| *p != survivor && !referenced.contains(p))
        .collect();

    let deactivated = store.deactivate_profiles(&doomed).await?;
    if deactivated.is_empty() {
        return Ok(EntityOutcome::Unchanged(survivor));
    }
    tracing::info!(survivor, deactivated = ?deactivated, "deactivated duplicate profiles");
    Ok(EntityOutcome::Deactivated {
        survivor,
        count: deactivated.len(),
    })
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;
