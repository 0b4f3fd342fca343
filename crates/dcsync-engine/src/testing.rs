//! In-memory store and ERP used by the engine's unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use dcsync_core::{
    find_equivalent, Address, EntityType, OrderItem, OrderRecord, OrderState, ProfileOwner,
    ProfileRecord, RemoteModel, SyncException, SyncStatus,
};
use dcsync_db::{CursorSnapshot, DbError};
use dcsync_odoo::{Domain, ErpClient, OdooError, Record, SearchOptions};

use crate::store::{CommerceStore, IdentityStore, LocalCursor};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub(crate) fn address() -> Address {
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

pub(crate) fn customer(uid: i64) -> ProfileRecord {
    ProfileRecord::customer(ProfileOwner::User(uid), "555-1234", address())
}

pub(crate) fn order(id: i64, billing_profile_id: Option<i64>) -> OrderRecord {
    OrderRecord {
        id,
        order_number: Some(format!("{}", 1000 + id)),
        state: OrderState::Completed,
        is_cart: false,
        customer_uid: 10,
        email: Some("dana@example.com".to_string()),
        billing_profile_id,
        shipping_profile_id: None,
        is_wholesale: false,
        total_price: Some(Decimal::new(2599, 2)),
        currency_code: "USD".to_string(),
        placed_at: Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).single(),
        items: vec![OrderItem {
            id: id * 10,
            variation_id: Some(3),
            sku: "TEA-01".to_string(),
            title: "Sencha 100g".to_string(),
            quantity: Decimal::new(2, 0),
            unit_price: Decimal::new(1250, 2),
        }],
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MappingEntry {
    pub remote_id: Option<i64>,
    pub status: SyncStatus,
    pub export_type: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct MigrateEntry {
    pub migration_id: String,
    pub entity_type: EntityType,
    pub remote_model: RemoteModel,
    pub source_id: i64,
    pub destination_id: Option<i64>,
    pub status: String,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub mappings: BTreeMap<(EntityType, i64, RemoteModel), MappingEntry>,
    pub migrate_map: Vec<MigrateEntry>,
    pub orders: BTreeMap<i64, OrderRecord>,
    pub profiles: BTreeMap<i64, ProfileRecord>,
    /// Profiles referenced by payment methods or shipments.
    pub extra_references: BTreeSet<i64>,
    pub emails: BTreeMap<i64, String>,
    pub fail_snapshots: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn add_profile(&self, mut profile: ProfileRecord) -> i64 {
        let mut state = self.state();
        let id = state.profiles.keys().next_back().copied().unwrap_or(0) + 1;
        profile.id = Some(id);
        state.profiles.insert(id, profile);
        id
    }

    pub fn add_order(&self, order: OrderRecord) {
        self.state().orders.insert(order.id, order);
    }

    pub fn mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Option<MappingEntry> {
        self.state()
            .mappings
            .get(&(entity_type, entity_id, remote_model))
            .cloned()
    }

    pub fn add_migration(
        &self,
        migration_id: &str,
        entity_type: EntityType,
        remote_model: RemoteModel,
        source_id: i64,
        destination_id: i64,
    ) {
        self.state().migrate_map.push(MigrateEntry {
            migration_id: migration_id.to_string(),
            entity_type,
            remote_model,
            source_id,
            destination_id: Some(destination_id),
            status: "imported".to_string(),
        });
    }

    fn is_synced(state: &MemoryState, key: (EntityType, i64, RemoteModel)) -> bool {
        state
            .mappings
            .get(&key)
            .is_some_and(|m| m.status == SyncStatus::Synced)
    }

    fn cursor_ids(state: &MemoryState, cursor: LocalCursor) -> Vec<i64> {
        match cursor {
            LocalCursor::OrdersPendingExport => state
                .orders
                .values()
                .filter(|o| o.state != OrderState::Draft && !o.is_cart)
                .filter(|o| {
                    !Self::is_synced(state, (EntityType::CommerceOrder, o.id, RemoteModel::SaleOrder))
                })
                .map(|o| o.id)
                .collect(),
            LocalCursor::ProfilesPendingExport => state
                .profiles
                .iter()
                .filter(|(_, p)| p.is_active && p.bundle == "customer")
                .filter(|(id, _)| {
                    !Self::is_synced(state, (EntityType::Profile, **id, RemoteModel::ResPartner))
                })
                .map(|(id, _)| *id)
                .collect(),
            LocalCursor::ActiveProfiles => state
                .profiles
                .iter()
                .filter(|(_, p)| p.is_active)
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    fn referenced(state: &MemoryState, id: i64) -> bool {
        state.extra_references.contains(&id)
            || state
                .orders
                .values()
                .any(|o| o.billing_profile_id == Some(id) || o.shipping_profile_id == Some(id))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn lookup_remote_id(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<Option<i64>, DbError> {
        Ok(self
            .mapping(entity_type, entity_id, remote_model)
            .and_then(|m| m.remote_id))
    }

    async fn lookup_local_id(
        &self,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<Option<i64>, DbError> {
        let state = self.state();
        let hits: Vec<_> = state
            .mappings
            .iter()
            .filter(|((_, _, model), m)| *model == remote_model && m.remote_id == Some(remote_id))
            .map(|((entity_type, id, _), _)| (*entity_type, *id))
            .collect();
        match hits.as_slice() {
            [] => Ok(None),
            [(_, id)] => Ok(Some(*id)),
            [(entity_type, _), ..] => Err(SyncException::MigrateLookup {
                entity_type: *entity_type,
                remote_model,
                entity_id: remote_id,
                found: hits.len(),
            }
            .into()),
        }
    }

    async fn save_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<(), DbError> {
        self.state().mappings.insert(
            (entity_type, entity_id, remote_model),
            MappingEntry {
                remote_id: Some(remote_id),
                status: SyncStatus::Synced,
                export_type: dcsync_core::DEFAULT_EXPORT_TYPE.to_string(),
                last_error: None,
            },
        );
        Ok(())
    }

    async fn set_sync_status(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        export_type: &str,
        id_map: &BTreeMap<i64, Option<i64>>,
        status: SyncStatus,
    ) -> Result<u64, DbError> {
        let mut state = self.state();
        for (id, remote_id) in id_map {
            let entry = state
                .mappings
                .entry((entity_type, *id, remote_model))
                .or_insert_with(|| MappingEntry {
                    remote_id: None,
                    status,
                    export_type: export_type.to_string(),
                    last_error: None,
                });
            if remote_id.is_some() {
                entry.remote_id = *remote_id;
            }
            if status != SyncStatus::Error {
                entry.last_error = None;
            }
            entry.status = status;
            entry.export_type = export_type.to_string();
        }
        Ok(id_map.len() as u64)
    }

    async fn record_sync_error(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        message: &str,
    ) -> Result<(), DbError> {
        let mut state = self.state();
        let entry = state
            .mappings
            .entry((entity_type, entity_id, remote_model))
            .or_insert_with(|| MappingEntry {
                remote_id: None,
                status: SyncStatus::Error,
                export_type: dcsync_core::DEFAULT_EXPORT_TYPE.to_string(),
                last_error: None,
            });
        entry.status = SyncStatus::Error;
        entry.last_error = Some(message.to_string());
        Ok(())
    }

    async fn delete_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<bool, DbError> {
        Ok(self
            .state()
            .mappings
            .remove(&(entity_type, entity_id, remote_model))
            .is_some())
    }

    async fn lookup_odoo_ids(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        entity_id: i64,
    ) -> Result<Option<i64>, DbError> {
        let state = self.state();
        let sources: BTreeSet<i64> = state
            .migrate_map
            .iter()
            .filter(|m| {
                m.entity_type == entity_type
                    && m.remote_model == remote_model
                    && m.destination_id == Some(entity_id)
            })
            .map(|m| m.source_id)
            .collect();
        match sources.len() {
            0 => Ok(None),
            1 => Ok(sources.first().copied()),
            found => Err(SyncException::MigrateLookup {
                entity_type,
                remote_model,
                entity_id,
                found,
            }
            .into()),
        }
    }

    async fn lookup_destination_id(
        &self,
        migration_id: &str,
        source_id: i64,
    ) -> Result<Option<i64>, DbError> {
        Ok(self
            .state()
            .migrate_map
            .iter()
            .find(|m| m.migration_id == migration_id && m.source_id == source_id)
            .and_then(|m| m.destination_id))
    }

    async fn save_id_mapping(
        &self,
        migration_id: &str,
        entity_type: EntityType,
        remote_model: RemoteModel,
        source_id: i64,
        destination_id: Option<i64>,
        source_row_status: &str,
    ) -> Result<(), DbError> {
        let mut state = self.state();
        state
            .migrate_map
            .retain(|m| !(m.migration_id == migration_id && m.source_id == source_id));
        state.migrate_map.push(MigrateEntry {
            migration_id: migration_id.to_string(),
            entity_type,
            remote_model,
            source_id,
            destination_id,
            status: source_row_status.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn get_order(&self, id: i64) -> Result<Option<OrderRecord>, DbError> {
        Ok(self.state().orders.get(&id).cloned())
    }

    async fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, DbError> {
        Ok(self.state().profiles.get(&id).cloned())
    }

    async fn contact_email(&self, profile: &ProfileRecord) -> Result<Option<String>, DbError> {
        if let Some(email) = profile
            .extra
            .get("email")
            .and_then(|values| values.first())
            .filter(|e| !e.is_empty())
        {
            return Ok(Some(email.clone()));
        }
        Ok(profile.id.and_then(|id| self.state().emails.get(&id).cloned()))
    }

    async fn find_equivalent_profiles(
        &self,
        candidate: &ProfileRecord,
        exclude_self: bool,
    ) -> Result<Vec<ProfileRecord>, DbError> {
        let state = self.state();
        let existing: Vec<ProfileRecord> = state.profiles.values().cloned().collect();
        Ok(find_equivalent(candidate, &existing, exclude_self)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<i64, DbError> {
        Ok(self.add_profile(profile.clone()))
    }

    async fn update_profile(&self, id: i64, profile: &ProfileRecord) -> Result<(), DbError> {
        let mut state = self.state();
        let slot = state.profiles.get_mut(&id).ok_or(DbError::NotFound)?;
        *slot = ProfileRecord {
            id: Some(id),
            ..profile.clone()
        };
        Ok(())
    }

    async fn is_referenced_by_placed_order(&self, id: i64) -> Result<bool, DbError> {
        Ok(self.state().orders.values().any(|o| {
            o.state != OrderState::Draft
                && !o.is_cart
                && (o.billing_profile_id == Some(id) || o.shipping_profile_id == Some(id))
        }))
    }

    async fn referenced_profile_ids(&self, ids: &[i64]) -> Result<BTreeSet<i64>, DbError> {
        let state = self.state();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| Self::referenced(&state, *id))
            .collect())
    }

    async fn deactivate_profiles(&self, ids: &[i64]) -> Result<Vec<i64>, DbError> {
        let mut state = self.state();
        let targets: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !Self::referenced(&state, *id))
            .filter(|id| state.profiles.get(id).is_some_and(|p| p.is_active))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for id in &targets {
            if let Some(profile) = state.profiles.get_mut(id) {
                profile.is_active = false;
            }
        }
        Ok(targets)
    }

    async fn snapshot(&self, cursor: LocalCursor) -> Result<CursorSnapshot, DbError> {
        let state = self.state();
        if state.fail_snapshots {
            return Err(DbError::NotFound);
        }
        let ids = Self::cursor_ids(&state, cursor);
        Ok(CursorSnapshot {
            total: ids.len() as i64,
            max_id: ids.last().copied(),
        })
    }

    async fn page(
        &self,
        cursor: LocalCursor,
        after_id: i64,
        max_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DbError> {
        let state = self.state();
        Ok(Self::cursor_ids(&state, cursor)
            .into_iter()
            .filter(|id| *id > after_id && *id <= max_id)
            .take(usize::try_from(limit).unwrap())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FakeErp
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct FakeErpState {
    pub records: BTreeMap<String, BTreeMap<i64, Record>>,
    pub next_id: i64,
    pub calls: Vec<String>,
    /// Creates on this model whose values carry this field/value fail.
    pub reject_create: Option<(String, String, Value)>,
}

impl Default for FakeErpState {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 100,
            calls: Vec::new(),
            reject_create: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeErp {
    state: Mutex<FakeErpState>,
}

pub(crate) fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn missing(model: &str, id: i64) -> OdooError {
    OdooError::Rpc {
        code: 200,
        message: format!("Record {model}({id}) does not exist"),
        name: Some("odoo.exceptions.MissingError".to_string()),
    }
}

fn scalar(value: &Value) -> Value {
    match value {
        Value::Array(pair) if pair.len() == 2 && pair[1].is_string() => pair[0].clone(),
        other => other.clone(),
    }
}

fn matches(id: i64, record: &Record, domain: &Domain) -> bool {
    domain.conditions().all(|(field, op, expected)| {
        let actual = if field == "id" {
            Value::from(id)
        } else {
            record.get(field).map_or(Value::Bool(false), scalar)
        };
        match op {
            "=" => actual == *expected,
            "!=" => actual != *expected,
            "in" => expected
                .as_array()
                .is_some_and(|values| values.contains(&actual)),
            ">" | ">=" | "<" | "<=" => match (actual.as_i64(), expected.as_i64()) {
                (Some(a), Some(e)) => match op {
                    ">" => a > e,
                    ">=" => a >= e,
                    "<" => a < e,
                    _ => a <= e,
                },
                _ => false,
            },
            _ => false,
        }
    })
}

impl FakeErp {
    pub fn state(&self) -> MutexGuard<'_, FakeErpState> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, model: &str, id: i64, value: Value) {
        self.state()
            .records
            .entry(model.to_string())
            .or_default()
            .insert(id, record(value));
    }

    pub fn get(&self, model: &str, id: i64) -> Option<Record> {
        self.state()
            .records
            .get(model)
            .and_then(|r| r.get(&id))
            .cloned()
    }

    pub fn count(&self, model: &str) -> usize {
        self.state().records.get(model).map_or(0, BTreeMap::len)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn with_id(id: i64, record: &Record) -> Record {
        let mut out = record.clone();
        out.insert("id".to_string(), Value::from(id));
        out
    }
}

#[async_trait]
impl ErpClient for FakeErp {
    async fn search_with(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<i64>, OdooError> {
        let mut state = self.state();
        state.calls.push(format!("search {model}"));
        let mut ids: Vec<i64> = state
            .records
            .get(model)
            .map(|records| {
                records
                    .iter()
                    .filter(|(id, r)| matches(**id, r, domain))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();
        if options.order.as_deref() == Some("id desc") {
            ids.reverse();
        }
        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        Ok(ids.into_iter().skip(offset).take(limit).collect())
    }

    async fn search_count(&self, model: &str, domain: &Domain) -> Result<i64, OdooError> {
        let ids = self
            .search_with(model, domain, &SearchOptions::default())
            .await?;
        Ok(ids.len() as i64)
    }

    async fn read(
        &self,
        model: &str,
        ids: &[i64],
        _fields: &[&str],
    ) -> Result<Vec<Record>, OdooError> {
        let mut state = self.state();
        state.calls.push(format!("read {model}"));
        let Some(records) = state.records.get(model) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| Self::with_id(*id, r)))
            .collect())
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Record>, OdooError> {
        let ids = self.search_with(model, domain, options).await?;
        self.read(model, &ids, fields).await
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, OdooError> {
        let mut state = self.state();
        state.calls.push(format!("create {model}"));
        if let Some((reject_model, field, value)) = &state.reject_create {
            if reject_model == model && values.get(field) == Some(value) {
                return Err(OdooError::Rpc {
                    code: 200,
                    message: format!("rejected {model} with {field}={value}"),
                    name: Some("odoo.exceptions.ValidationError".to_string()),
                });
            }
        }
        let id = state.next_id;
        state.next_id += 1;
        state
            .records
            .entry(model.to_string())
            .or_default()
            .insert(id, values);
        Ok(id)
    }

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<bool, OdooError> {
        let mut state = self.state();
        state.calls.push(format!("write {model}"));
        let records = state.records.entry(model.to_string()).or_default();
        for id in ids {
            let record = records.get_mut(id).ok_or_else(|| missing(model, *id))?;
            record.extend(values.clone());
        }
        Ok(true)
    }

    async fn call_method(
        &self,
        model: &str,
        method: &str,
        ids: &[i64],
    ) -> Result<Value, OdooError> {
        let mut state = self.state();
        state.calls.push(format!("{method} {model}"));
        let new_state = match (model, method) {
            ("sale.order", "action_cancel") | ("account.move", "button_cancel") => "cancel",
            ("account.move", "button_draft") => "draft",
            _ => return Ok(Value::Bool(true)),
        };
        let records = state.records.entry(model.to_string()).or_default();
        for id in ids {
            let record = records.get_mut(id).ok_or_else(|| missing(model, *id))?;
            record.insert("state".to_string(), Value::from(new_state));
        }
        Ok(Value::Bool(true))
    }
}
