//! Read access to commerce orders for the order exporter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use dcsync_core::{OrderItem, OrderRecord};

use crate::{CursorSnapshot, DbError};

/// Orders that are placed and either never synced to `sale.order`, last
/// failed, or changed since the last successful sync.
///
/// Shared by the snapshot and page queries so both count the same rows.
const PENDING_EXPORT_FILTER: &str = "\
    FROM orders o \
    LEFT JOIN entity_mappings m \
           ON m.entity_type = 'commerce_order' \
          AND m.entity_id = o.id \
          AND m.remote_model = 'sale.order' \
    WHERE o.state <> 'draft' \
      AND NOT o.is_cart \
      AND (m.id IS NULL \
           OR m.sync_status <> 'synced' \
           OR m.synced_at IS NULL \
           OR o.changed_at > m.synced_at)";

#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: Option<String>,
    state: String,
    is_cart: bool,
    customer_uid: i64,
    email: Option<String>,
    billing_profile_id: Option<i64>,
    shipping_profile_id: Option<i64>,
    is_wholesale: bool,
    total_price: Option<Decimal>,
    currency_code: String,
    placed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    variation_id: Option<i64>,
    sku: String,
    title: String,
    quantity: Decimal,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            variation_id: row.variation_id,
            sku: row.sku,
            title: row.title,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

/// Loads an order with its line items (in item id order).
///
/// # Errors
///
/// Returns [`DbError::Decode`] if the stored state is unknown, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<OrderRecord>, DbError> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(
        "SELECT id, order_number, state, is_cart, customer_uid, email, \
                billing_profile_id, shipping_profile_id, is_wholesale, \
                total_price, currency_code, placed_at \
         FROM orders \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, variation_id, sku, title, quantity, unit_price \
         FROM order_items \
         WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let state = row.state.parse().map_err(|source| DbError::Decode {
        table: "orders",
        column: "state",
        source,
    })?;

    Ok(Some(OrderRecord {
        id: row.id,
        order_number: row.order_number,
        state,
        is_cart: row.is_cart,
        customer_uid: row.customer_uid,
        email: row.email,
        billing_profile_id: row.billing_profile_id,
        shipping_profile_id: row.shipping_profile_id,
        is_wholesale: row.is_wholesale,
        total_price: row.total_price,
        currency_code: row.currency_code,
        placed_at: row.placed_at,
        items: items.into_iter().map(OrderItem::from).collect(),
    }))
}

/// Count and highest id of the orders awaiting export.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn order_export_snapshot(pool: &PgPool) -> Result<CursorSnapshot, DbError> {
    let snapshot = sqlx::query_as::<_, CursorSnapshot>(&format!(
        "SELECT COUNT(*) AS total, MAX(o.id) AS max_id {PENDING_EXPORT_FILTER}"
    ))
    .fetch_one(pool)
    .await?;

    Ok(snapshot)
}

/// Next page of order ids awaiting export, strictly after `after_id` and no
/// higher than `max_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_ids_pending_export(
    pool: &PgPool,
    after_id: i64,
    max_id: i64,
    limit: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT o.id {PENDING_EXPORT_FILTER} \
           AND o.id > $1 AND o.id <= $2 \
         ORDER BY o.id \
         LIMIT $3"
    ))
    .bind(after_id)
    .bind(max_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
