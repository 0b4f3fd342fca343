//! Placed commerce orders → `sale.order`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use dcsync_core::{
    EntityType, OrderItem, OrderRecord, OrderState, RemoteModel, SyncException, SyncJobKind,
};
use dcsync_odoo::{Domain, ErpClient, Record, SearchOptions};

use crate::error::SyncError;
use crate::export::partner::ensure_partner;
use crate::invoice::cancel_order;
use crate::orchestrator::{
    export_entity, has_remote_record, EntityOutcome, ExportPlan, SyncContext, SyncSettings,
};
use crate::store::Store;

/// Odoo's datetime wire format (UTC, no offset).
const ODOO_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pricelist for `order`: the configured wholesale pricelist for wholesale
/// orders, otherwise none (Odoo applies the partner default).
#[must_use]
pub fn wholesale_pricelist(order: &OrderRecord, settings: &SyncSettings) -> Option<i64> {
    if order.is_wholesale {
        settings.wholesale_pricelist_id
    } else {
        None
    }
}

fn decimal(value: Decimal) -> Value {
    value.to_f64().map_or(Value::Null, Value::from)
}

/// Partner for an anonymous checkout, keyed by the order email.
async fn email_partner(erp: &dyn ErpClient, email: &str) -> Result<i64, SyncError> {
    let hits = erp
        .search_with(
            RemoteModel::ResPartner.as_str(),
            &Domain::new().eq("email", email),
            &SearchOptions::limit(1),
        )
        .await?;
    if let Some(&id) = hits.first() {
        return Ok(id);
    }
    let mut values = Record::new();
    values.insert("name".to_string(), Value::from(email));
    values.insert("email".to_string(), Value::from(email));
    Ok(erp
        .create(RemoteModel::ResPartner.as_str(), values)
        .await?)
}

/// Partner for an order without address profiles: the registered
/// customer's partner (matched on `ref`), else the one for the order email.
async fn customer_partner(
    erp: &dyn ErpClient,
    order: &OrderRecord,
) -> Result<Option<i64>, SyncError> {
    if order.customer_uid > 0 {
        let hits = erp
            .search_with(
                RemoteModel::ResPartner.as_str(),
                &Domain::new().eq("ref", order.customer_uid.to_string()),
                &SearchOptions::limit(1),
            )
            .await?;
        if let Some(&id) = hits.first() {
            return Ok(Some(id));
        }
    }
    match order.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => Ok(Some(email_partner(erp, email).await?)),
        None => Ok(None),
    }
}

/// `(partner_id, partner_invoice_id, partner_shipping_id)` for `order`, or
/// `None` when nothing identifies the customer in Odoo.
async fn resolve_partners(
    store: &dyn Store,
    erp: &dyn ErpClient,
    order: &OrderRecord,
) -> Result<Option<(i64, i64, i64)>, SyncError> {
    let billing = match order.billing_profile_id {
        Some(id) => Some(ensure_partner(store, erp, id).await?),
        None => None,
    };
    let shipping = match order.shipping_profile_id {
        Some(id) => Some(ensure_partner(store, erp, id).await?),
        None => None,
    };

    let partner = match billing.or(shipping) {
        Some(id) => id,
        None => match customer_partner(erp, order).await? {
            Some(id) => id,
            None => return Ok(None),
        },
    };
    Ok(Some((
        partner,
        billing.unwrap_or(partner),
        shipping.unwrap_or(partner),
    )))
}

/// `product.product` id for a line item.
///
/// Uses the variation's mapping when there is one, otherwise searches by
/// SKU (`default_code`) and remembers the hit.
///
/// # Errors
///
/// Returns `ProductNotExists` when no product carries the SKU.
pub async fn resolve_product(
    store: &dyn Store,
    erp: &dyn ErpClient,
    item: &OrderItem,
) -> Result<i64, SyncError> {
    if let Some(variation_id) = item.variation_id {
        if let Some(product_id) = store
            .lookup_remote_id(
                EntityType::CommerceProductVariation,
                variation_id,
                RemoteModel::ProductProduct,
            )
            .await?
        {
            return Ok(product_id);
        }
    }

    let hits = erp
        .search_with(
            RemoteModel::ProductProduct.as_str(),
            &Domain::new().eq("default_code", item.sku.as_str()),
            &SearchOptions::limit(1),
        )
        .await?;
    let Some(&product_id) = hits.first() else {
        return Err(SyncException::ProductNotExists {
            sku: item.sku.clone(),
        }
        .into());
    };

    if let Some(variation_id) = item.variation_id {
        store
            .save_mapping(
                EntityType::CommerceProductVariation,
                variation_id,
                RemoteModel::ProductProduct,
                product_id,
            )
            .await?;
    }
    Ok(product_id)
}

async fn order_lines(
    store: &dyn Store,
    erp: &dyn ErpClient,
    order: &OrderRecord,
) -> Result<Vec<Value>, SyncError> {
    let mut lines = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let product_id = resolve_product(store, erp, item).await?;
        lines.push(json!([0, 0, {
            "product_id": product_id,
            "name": item.title,
            "product_uom_qty": decimal(item.quantity),
            "price_unit": decimal(item.unit_price),
        }]));
    }
    Ok(lines)
}

/// Builds the export plan for an eligible, non-canceled order, or `None`
/// when the order has no customer partner to attach to.
///
/// Order lines are only resolved for orders that do not have a sale order
/// yet; updates leave the lines Odoo already has untouched.
///
/// # Errors
///
/// Returns [`SyncError`] when a partner or product cannot be resolved.
pub async fn order_plan(
    store: &dyn Store,
    erp: &dyn ErpClient,
    settings: &SyncSettings,
    order: &OrderRecord,
) -> Result<Option<ExportPlan>, SyncError> {
    let Some((partner, invoice_partner, shipping_partner)) =
        resolve_partners(store, erp, order).await?
    else {
        return Ok(None);
    };
    let reference = order.reference();

    let mut values = Record::new();
    values.insert("partner_id".to_string(), Value::from(partner));
    values.insert("partner_invoice_id".to_string(), Value::from(invoice_partner));
    values.insert("partner_shipping_id".to_string(), Value::from(shipping_partner));
    values.insert("client_order_ref".to_string(), Value::from(reference.as_str()));
    if let Some(placed_at) = order.placed_at {
        values.insert(
            "date_order".to_string(),
            Value::from(placed_at.format(ODOO_DATETIME_FORMAT).to_string()),
        );
    }
    if let Some(pricelist_id) = wholesale_pricelist(order, settings) {
        values.insert("pricelist_id".to_string(), Value::from(pricelist_id));
    }

    let mut plan = ExportPlan::new(
        EntityType::CommerceOrder,
        order.id,
        RemoteModel::SaleOrder,
        values,
    );
    let existing =
        has_remote_record(store, EntityType::CommerceOrder, order.id, RemoteModel::SaleOrder)
            .await?;
    if !existing {
        plan.create_values.insert(
            "order_line".to_string(),
            Value::Array(order_lines(store, erp, order).await?),
        );
        plan.duplicate_check = Some(Domain::new().eq("client_order_ref", reference));
    }
    Ok(Some(plan))
}

/// Exports one order, or cancels its sale order when it was canceled
/// locally after being exported.
///
/// Drafts, carts and anonymous orders without an email are skipped without
/// contacting Odoo, as are canceled orders that were never exported. A
/// registered customer's order that names neither a profile nor an email is
/// skipped when no partner carries the customer's uid as `ref`.
///
/// # Errors
///
/// Returns [`SyncError`] on ERP, lookup or store failures and for every
/// [`SyncException`] raised along the way.
pub async fn export_order(
    ctx: &SyncContext<'_>,
    order_id: i64,
) -> Result<EntityOutcome, SyncError> {
    let erp = ctx.erp(SyncJobKind::OrderExport)?;
    let store = ctx.store;
    let Some(order) = store.get_order(order_id).await? else {
        return Ok(EntityOutcome::Skipped);
    };

    if order.state == OrderState::Canceled {
        let Some(remote_id) = store
            .lookup_remote_id(EntityType::CommerceOrder, order_id, RemoteModel::SaleOrder)
            .await?
        else {
            return Ok(EntityOutcome::Skipped);
        };
        cancel_order(erp, remote_id).await?;
        store
            .save_mapping(
                EntityType::CommerceOrder,
                order_id,
                RemoteModel::SaleOrder,
                remote_id,
            )
            .await?;
        return Ok(EntityOutcome::Cancelled(remote_id));
    }

    if !order.is_export_eligible() {
        tracing::debug!(order_id, "order not eligible for export");
        return Ok(EntityOutcome::Skipped);
    }

    let Some(plan) = order_plan(store, erp, ctx.settings, &order).await? else {
        tracing::warn!(order_id, uid = order.customer_uid, "no profile, partner or email for order");
        return Ok(EntityOutcome::Skipped);
    };
    export_entity(store, erp, plan).await
}

#[cfg(test)]
#[path = "order_test.rs"]
mod tests;
