use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Workflow state of a commerce order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Draft,
    Validation,
    Fulfillment,
    Completed,
    Canceled,
}

impl OrderState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validation => "validation",
            Self::Fulfillment => "fulfillment",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for OrderState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "validation" => Ok(Self::Validation),
            "fulfillment" => Ok(Self::Fulfillment),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            other => Err(CoreError::UnknownOrderState(other.to_string())),
        }
    }
}

/// A line item on a commerce order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub variation_id: Option<i64>,
    pub sku: String,
    pub title: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// A placed (or in-progress) commerce order, as seen by the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    pub order_number: Option<String>,
    pub state: OrderState,
    pub is_cart: bool,
    /// `0` for anonymous checkouts.
    pub customer_uid: i64,
    pub email: Option<String>,
    pub billing_profile_id: Option<i64>,
    pub shipping_profile_id: Option<i64>,
    pub is_wholesale: bool,
    pub total_price: Option<Decimal>,
    pub currency_code: String,
    pub placed_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
}

impl OrderRecord {
    /// Whether the order may be sent to the ERP at all.
    ///
    /// Drafts, carts, and anonymous orders without a customer email are never
    /// exported; callers skip them silently.
    #[must_use]
    pub fn is_export_eligible(&self) -> bool {
        if self.state == OrderState::Draft || self.is_cart {
            return false;
        }
        let has_email = self.email.as_deref().is_some_and(|e| !e.trim().is_empty());
        !(self.customer_uid == 0 && !has_email)
    }

    /// Reference written to `client_order_ref` and used to look for
    /// duplicates. Falls back to the local id when no number was assigned.
    #[must_use]
    pub fn reference(&self) -> String {
        self.order_number
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.to_string())
    }
}
