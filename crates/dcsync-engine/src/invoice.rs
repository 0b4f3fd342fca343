//! Sale order and invoice cancellation in Odoo.

use serde_json::Value;

use dcsync_core::SyncException;
use dcsync_odoo::erp::string_field;
use dcsync_odoo::{Domain, ErpClient, SearchOptions};

use crate::error::SyncError;

const SALE_ORDER: &str = "sale.order";
const ACCOUNT_MOVE: &str = "account.move";
const ACCOUNT_MOVE_LINE: &str = "account.move.line";

/// Payment states that pin a posted invoice.
const SETTLED_PAYMENT_STATES: [&str; 4] = ["paid", "in_payment", "partial", "reversed"];

/// Cancels sale order `order_id` together with its invoice, if it has one.
///
/// # Errors
///
/// - `OrderNotExists` when the sale order is gone.
/// - `MultipleInvoices` when it carries more than one invoice.
/// - Any error from [`cancel_invoice`].
pub async fn cancel_order(erp: &dyn ErpClient, order_id: i64) -> Result<(), SyncError> {
    let orders = erp
        .read(SALE_ORDER, &[order_id], &["state", "invoice_ids"])
        .await?;
    let Some(order) = orders.first() else {
        return Err(SyncException::OrderNotExists { order_id }.into());
    };

    let invoice_ids: Vec<i64> = order
        .get("invoice_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    match invoice_ids.as_slice() {
        [] => {}
        [move_id] => cancel_invoice(erp, *move_id).await?,
        _ => return Err(SyncException::MultipleInvoices { order_id }.into()),
    }

    if string_field(order, "state") != Some("cancel") {
        erp.call_method(SALE_ORDER, "action_cancel", &[order_id])
            .await?;
    }
    tracing::info!(order_id, invoices = invoice_ids.len(), "cancelled Odoo sale order");
    Ok(())
}

/// Cancels invoice `move_id`, resetting a posted invoice to draft first.
///
/// Cancelling an already cancelled invoice is a no-op.
///
/// # Errors
///
/// Returns `AccountMoveNotExists` when the move is gone, and
/// `InvoiceMayNotBeCancelled` when it is posted and (partly) paid or
/// reversed.
pub async fn cancel_invoice(erp: &dyn ErpClient, move_id: i64) -> Result<(), SyncError> {
    let moves = erp
        .read(ACCOUNT_MOVE, &[move_id], &["state", "payment_state"])
        .await?;
    let Some(invoice) = moves.first() else {
        return Err(SyncException::AccountMoveNotExists { move_id }.into());
    };

    let state = string_field(invoice, "state").unwrap_or("draft");
    let payment_state = string_field(invoice, "payment_state").unwrap_or("not_paid");

    match state {
        "cancel" => return Ok(()),
        "draft" => {}
        _ if SETTLED_PAYMENT_STATES.contains(&payment_state) => {
            return Err(SyncException::InvoiceMayNotBeCancelled {
                move_id,
                state: format!("{state}/{payment_state}"),
            }
            .into());
        }
        _ => {
            erp.call_method(ACCOUNT_MOVE, "button_draft", &[move_id])
                .await?;
        }
    }

    erp.call_method(ACCOUNT_MOVE, "button_cancel", &[move_id])
        .await?;
    Ok(())
}

/// Returns the invoice line of `move_id` for `product_id`.
///
/// # Errors
///
/// Returns `AccountMoveLineNotExists` when the invoice has no such line.
pub async fn find_invoice_line(
    erp: &dyn ErpClient,
    move_id: i64,
    product_id: i64,
) -> Result<i64, SyncError> {
    let domain = Domain::new()
        .eq("move_id", move_id)
        .eq("product_id", product_id);
    let hits = erp
        .search_with(ACCOUNT_MOVE_LINE, &domain, &SearchOptions::limit(1))
        .await?;
    hits.first().copied().ok_or_else(|| {
        SyncException::AccountMoveLineNotExists {
            move_id,
            product_id,
        }
        .into()
    })
}
