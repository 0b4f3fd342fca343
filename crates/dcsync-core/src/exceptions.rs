//! Typed failures raised while synchronizing with the ERP.
//!
//! Every variant is terminal for the single sync attempt that raised it; the
//! batch driver records the entity as `error` and the next run retries it.
//! Expected absence (an entity that was never synced, a candidate profile with
//! no duplicates) is modelled with `Option`/empty results, never with these.

use thiserror::Error;

use crate::entities::{EntityType, RemoteModel};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncException {
    #[error("Odoo sale order {order_id} does not exist")]
    OrderNotExists { order_id: i64 },

    #[error("Odoo already has sale order {order_id} for this commerce order")]
    DuplicateOrder { order_id: i64 },

    #[error("Odoo sale order {order_id} has more than one invoice")]
    MultipleInvoices { order_id: i64 },

    #[error("Odoo account move {move_id} does not exist")]
    AccountMoveNotExists { move_id: i64 },

    #[error("Odoo account move {move_id} has no line for product {product_id}")]
    AccountMoveLineNotExists { move_id: i64, product_id: i64 },

    #[error("Odoo invoice {move_id} may not be cancelled (state: {state})")]
    InvoiceMayNotBeCancelled { move_id: i64, state: String },

    #[error("no Odoo product with default code {sku}")]
    ProductNotExists { sku: String },

    #[error(
        "expected exactly one {remote_model} id for {entity_type} {entity_id}, found {found}"
    )]
    MigrateLookup {
        entity_type: EntityType,
        remote_model: RemoteModel,
        entity_id: i64,
        found: usize,
    },
}

impl SyncException {
    /// The remote object id the exception refers to, when it has one.
    #[must_use]
    pub fn remote_id(&self) -> Option<i64> {
        match self {
            Self::OrderNotExists { order_id }
            | Self::DuplicateOrder { order_id }
            | Self::MultipleInvoices { order_id } => Some(*order_id),
            Self::AccountMoveNotExists { move_id }
            | Self::AccountMoveLineNotExists { move_id, .. }
            | Self::InvoiceMayNotBeCancelled { move_id, .. } => Some(*move_id),
            Self::ProductNotExists { .. } | Self::MigrateLookup { .. } => None,
        }
    }

    /// Short machine-readable kind, stored alongside `error` mappings.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OrderNotExists { .. } => "order_not_exists",
            Self::DuplicateOrder { .. } => "duplicate_order",
            Self::MultipleInvoices { .. } => "multiple_invoices",
            Self::AccountMoveNotExists { .. } => "account_move_not_exists",
            Self::AccountMoveLineNotExists { .. } => "account_move_line_not_exists",
            Self::InvoiceMayNotBeCancelled { .. } => "invoice_may_not_be_cancelled",
            Self::ProductNotExists { .. } => "product_not_exists",
            Self::MigrateLookup { .. } => "migrate_lookup",
        }
    }
}
