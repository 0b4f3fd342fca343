//! Customer profiles (address book entries) and the equivalence rules used to
//! keep them free of duplicates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured postal address. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub country_code: String,
    pub administrative_area: String,
    pub locality: String,
    pub postal_code: String,
    pub address_line1: String,
    pub address_line2: String,
    pub organization: String,
    pub given_name: String,
    pub family_name: String,
}

impl Address {
    /// `true` when no address component is filled in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }

    /// Given and family name joined with a single space.
    #[must_use]
    pub fn full_name(&self) -> String {
        [self.given_name.as_str(), self.family_name.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn fields(&self) -> [&str; 9] {
        [
            self.country_code.as_str(),
            self.administrative_area.as_str(),
            self.locality.as_str(),
            self.postal_code.as_str(),
            self.address_line1.as_str(),
            self.address_line2.as_str(),
            self.organization.as_str(),
            self.given_name.as_str(),
            self.family_name.as_str(),
        ]
    }
}

/// Who a profile belongs to. Anonymous checkouts are keyed by session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ProfileOwner {
    User(i64),
    Session(String),
}

impl ProfileOwner {
    /// Drupal-style uid: `0` for anonymous session owners.
    #[must_use]
    pub fn uid(&self) -> i64 {
        match self {
            Self::User(uid) => *uid,
            Self::Session(_) => 0,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Session(sid) => Some(sid),
        }
    }
}

/// A customer profile. `id` is `None` for candidates that have not been
/// persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Option<i64>,
    pub owner: ProfileOwner,
    pub bundle: String,
    pub is_active: bool,
    pub phone: String,
    pub address: Address,
    /// Remaining multi-value fields keyed by field name, in delta order.
    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

impl ProfileRecord {
    #[must_use]
    pub fn customer(owner: ProfileOwner, phone: impl Into<String>, address: Address) -> Self {
        Self {
            id: None,
            owner,
            bundle: "customer".to_string(),
            is_active: true,
            phone: phone.into(),
            address,
            extra: BTreeMap::new(),
        }
    }
}

/// Whether `other` is an equivalent of `candidate` for deduplication.
///
/// Compares bundle, active flag, owner and phone exactly; the address is
/// compared field by field (case-sensitive) only when the candidate has one.
#[must_use]
pub fn is_equivalent(candidate: &ProfileRecord, other: &ProfileRecord) -> bool {
    if candidate.bundle != other.bundle
        || candidate.is_active != other.is_active
        || candidate.owner != other.owner
        || candidate.phone != other.phone
    {
        return false;
    }
    candidate.address.is_empty() || candidate.address == other.address
}

/// In-memory counterpart of the indexed profile search.
///
/// With `exclude_self`, a persisted candidate never matches its own row.
#[must_use]
pub fn find_equivalent<'a>(
    candidate: &ProfileRecord,
    existing: &'a [ProfileRecord],
    exclude_self: bool,
) -> Vec<&'a ProfileRecord> {
    existing
        .iter()
        .filter(|other| !(exclude_self && candidate.id.is_some() && other.id == candidate.id))
        .filter(|other| is_equivalent(candidate, other))
        .collect()
}

/// Field-by-field equality, ignoring identity.
///
/// Used to tell whether an "update" changes anything, so profiles referenced
/// by placed orders are not disturbed by no-op saves.
#[must_use]
pub fn profiles_equal(a: &ProfileRecord, b: &ProfileRecord) -> bool {
    a.bundle == b.bundle
        && a.owner == b.owner
        && a.is_active == b.is_active
        && a.phone == b.phone
        && a.address == b.address
        && a.extra == b.extra
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            country_code: "US".to_string(),
            administrative_area: "CO".to_string(),
            locality: "Denver".to_string(),
            postal_code: "80202".to_string(),
            address_line1: "1600 Market St".to_string(),
            address_line2: String::new(),
            organization: String::new(),
            given_name: "Dana".to_string(),
            family_name: "Reyes".to_string(),
        }
    }

    fn profile(id: Option<i64>) -> ProfileRecord {
        let mut p = ProfileRecord::customer(ProfileOwner::User(10), "555-1234", address());
        p.id = id;
        p
    }

    #[test]
    fn identical_profiles_are_equal() {
        assert!(profiles_equal(&profile(Some(1)), &profile(Some(2))));
    }

    #[test]
    fn changing_postal_code_breaks_equality() {
        let a = profile(Some(1));
        let mut b = profile(Some(1));
        b.address.postal_code = "80203".to_string();
        assert!(!profiles_equal(&a, &b));
    }

    #[test]
    fn extra_multi_value_fields_take_part_in_equality() {
        let a = profile(Some(1));
        let mut b = profile(Some(1));
        b.extra
            .insert("tax_number".to_string(), vec!["EIN-1".to_string()]);
        assert!(!profiles_equal(&a, &b));

        let mut c = b.clone();
        c.extra.insert(
            "tax_number".to_string(),
            vec!["EIN-1".to_string(), "EIN-2".to_string()],
        );
        assert!(!profiles_equal(&b, &c));
    }

    #[test]
    fn third_identical_candidate_matches_both_existing_profiles() {
        let existing = vec![profile(Some(1)), profile(Some(2))];
        let candidate = profile(None);
        let matches = find_equivalent(&candidate, &existing, true);
        let ids: Vec<_> = matches.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[test]
    fn exclude_self_skips_the_persisted_candidate() {
        let existing = vec![profile(Some(1)), profile(Some(2))];
        let candidate = profile(Some(1));
        let matches = find_equivalent(&candidate, &existing, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, Some(2));

        let with_self = find_equivalent(&candidate, &existing, false);
        assert_eq!(with_self.len(), 2);
    }

    #[test]
    fn address_comparison_is_case_sensitive() {
        let mut other = profile(Some(2));
        other.address.locality = "DENVER".to_string();
        assert!(!is_equivalent(&profile(None), &other));
    }

    #[test]
    fn empty_candidate_address_matches_on_owner_and_phone() {
        let mut candidate = profile(None);
        candidate.address = Address::default();
        assert!(is_equivalent(&candidate, &profile(Some(3))));
    }

    #[test]
    fn different_owner_or_phone_never_matches() {
        let mut other_owner = profile(Some(2));
        other_owner.owner = ProfileOwner::User(11);
        assert!(!is_equivalent(&profile(None), &other_owner));

        let mut other_phone = profile(Some(3));
        other_phone.phone = "555-9999".to_string();
        assert!(!is_equivalent(&profile(None), &other_phone));
    }

    #[test]
    fn inactive_profiles_do_not_match_active_candidates() {
        let mut inactive = profile(Some(2));
        inactive.is_active = false;
        assert!(!is_equivalent(&profile(None), &inactive));
    }

    #[test]
    fn session_owner_reports_anonymous_uid() {
        let owner = ProfileOwner::Session("abc".to_string());
        assert_eq!(owner.uid(), 0);
        assert_eq!(owner.session_id(), Some("abc"));
        assert_eq!(ProfileOwner::User(4).session_id(), None);
    }

    #[test]
    fn full_name_skips_missing_parts() {
        let mut a = address();
        assert_eq!(a.full_name(), "Dana Reyes");
        a.given_name.clear();
        assert_eq!(a.full_name(), "Reyes");
    }
}
