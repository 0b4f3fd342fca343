use serde_json::json;

use dcsync_core::{EntityType, RemoteModel, SyncException, SyncStatus};
use dcsync_odoo::Domain;

use super::*;
use crate::store::IdentityStore;
use crate::testing::{record, FakeErp, MemoryStore};

fn order_plan(id: i64) -> ExportPlan {
    let mut plan = ExportPlan::new(
        EntityType::CommerceOrder,
        id,
        RemoteModel::SaleOrder,
        record(json!({ "client_order_ref": id.to_string(), "partner_id": 5 })),
    );
    plan.create_values = record(json!({ "order_line": [[0, 0, { "product_id": 9 }]] }));
    plan.duplicate_check = Some(Domain::new().eq("client_order_ref", id.to_string()));
    plan
}

#[tokio::test]
async fn first_export_creates_then_later_exports_write() {
    let store = MemoryStore::default();
    let erp = FakeErp::default();
    erp.state().next_id = 777;

    let outcome = export_entity(&store, &erp, order_plan(42)).await.unwrap();
    assert_eq!(outcome, EntityOutcome::Created(777));
    assert_eq!(
        store
            .lookup_remote_id(EntityType::CommerceOrder, 42, RemoteModel::SaleOrder)
            .await
            .unwrap(),
        Some(777)
    );
    assert_eq!(
        store
            .lookup_local_id(RemoteModel::SaleOrder, 777)
            .await
            .unwrap(),
        Some(42)
    );
    assert!(erp.get("sale.order", 777).unwrap().contains_key("order_line"));

    let outcome = export_entity(&store, &erp, order_plan(42)).await.unwrap();
    assert_eq!(outcome, EntityOutcome::Updated(777));
    assert_eq!(erp.count("sale.order"), 1);
    assert_eq!(
        erp.calls().iter().filter(|c| *c == "write sale.order").count(),
        1
    );
}

#[tokio::test]
async fn duplicate_check_hit_raises_duplicate_order_without_mapping() {
    let store = MemoryStore::default();
    let erp = FakeErp::default();
    erp.insert("sale.order", 500, json!({ "client_order_ref": "42" }));

    let err = export_entity(&store, &erp, order_plan(42))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Sync(SyncException::DuplicateOrder { order_id: 500 })
    ));
    assert!(store
        .mapping(EntityType::CommerceOrder, 42, RemoteModel::SaleOrder)
        .is_none());
    assert_eq!(erp.count("sale.order"), 1);
}

#[tokio::test]
async fn imported_record_is_adopted_instead_of_created() {
    let store = MemoryStore::default();
    let erp = FakeErp::default();
    erp.insert("res.partner", 31, json!({ "name": "Dana Reyes" }));
    store.add_migration("odoo_partner", EntityType::Profile, RemoteModel::ResPartner, 31, 4);

    let plan = ExportPlan::new(
        EntityType::Profile,
        4,
        RemoteModel::ResPartner,
        record(json!({ "name": "Dana R. Reyes" })),
    );
    let outcome = export_entity(&store, &erp, plan).await.unwrap();

    assert_eq!(outcome, EntityOutcome::Adopted(31));
    assert_eq!(erp.count("res.partner"), 1);
    assert_eq!(erp.get("res.partner", 31).unwrap()["name"], json!("Dana R. Reyes"));
    let mapping = store
        .mapping(EntityType::Profile, 4, RemoteModel::ResPartner)
        .unwrap();
    assert_eq!(mapping.remote_id, Some(31));
    assert_eq!(mapping.status, SyncStatus::Synced);
}

#[tokio::test]
async fn ambiguous_migration_map_is_not_tie_broken() {
    let store = MemoryStore::default();
    let erp = FakeErp::default();
    store.add_migration("odoo_partner", EntityType::Profile, RemoteModel::ResPartner, 31, 4);
    store.add_migration("odoo_partner", EntityType::Profile, RemoteModel::ResPartner, 32, 4);

    let plan = ExportPlan::new(EntityType::Profile, 4, RemoteModel::ResPartner, Record::new());
    let err = export_entity(&store, &erp, plan).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Sync(SyncException::MigrateLookup { found: 2, .. })
    ));
    assert!(erp.calls().is_empty());
}

#[tokio::test]
async fn rejected_create_leaves_no_mapping() {
    let store = MemoryStore::default();
    let erp = FakeErp::default();
    erp.state().reject_create = Some((
        "sale.order".to_string(),
        "client_order_ref".to_string(),
        json!("42"),
    ));

    let err = export_entity(&store, &erp, order_plan(42))
        .await
        .unwrap_err();
    assert!(err.is_entity_scoped());
    assert!(store
        .mapping(EntityType::CommerceOrder, 42, RemoteModel::SaleOrder)
        .is_none());

    mark_entity_error(&store, EntityType::CommerceOrder, 42, RemoteModel::SaleOrder, &err)
        .await
        .unwrap();
    let mapping = store
        .mapping(EntityType::CommerceOrder, 42, RemoteModel::SaleOrder)
        .unwrap();
    assert_eq!(mapping.status, SyncStatus::Error);
    assert_eq!(mapping.remote_id, None);
    assert!(mapping.last_error.unwrap().contains("rejected sale.order"));
}

#[tokio::test]
async fn sync_exceptions_are_recorded_with_their_kind() {
    let store = MemoryStore::default();
    let err = SyncError::from(SyncException::ProductNotExists {
        sku: "TEA-01".to_string(),
    });
    mark_entity_error(&store, EntityType::CommerceOrder, 7, RemoteModel::SaleOrder, &err)
        .await
        .unwrap();
    let message = store
        .mapping(EntityType::CommerceOrder, 7, RemoteModel::SaleOrder)
        .unwrap()
        .last_error
        .unwrap();
    assert!(message.starts_with("product_not_exists: "), "{message}");
    assert!(message.contains("TEA-01"));
}
