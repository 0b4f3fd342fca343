//! Identifiers shared by the identity store, the ERP client and the batch
//! driver: local entity kinds, remote Odoo models, and per-mapping sync status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Export type recorded on mappings written without an explicit one.
pub const DEFAULT_EXPORT_TYPE: &str = "default";

/// Kind of local commerce entity that can be mapped to a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    CommerceOrder,
    Profile,
    CommerceProductVariation,
    User,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommerceOrder => "commerce_order",
            Self::Profile => "profile",
            Self::CommerceProductVariation => "commerce_product_variation",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commerce_order" | "order" => Ok(Self::CommerceOrder),
            "profile" => Ok(Self::Profile),
            "commerce_product_variation" | "product_variation" => {
                Ok(Self::CommerceProductVariation)
            }
            "user" => Ok(Self::User),
            other => Err(CoreError::UnknownEntityType(other.to_string())),
        }
    }
}

/// Odoo model a local entity is exported to or imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RemoteModel {
    #[serde(rename = "sale.order")]
    SaleOrder,
    #[serde(rename = "res.partner")]
    ResPartner,
    #[serde(rename = "product.product")]
    ProductProduct,
    #[serde(rename = "account.move")]
    AccountMove,
    #[serde(rename = "account.move.line")]
    AccountMoveLine,
}

impl RemoteModel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SaleOrder => "sale.order",
            Self::ResPartner => "res.partner",
            Self::ProductProduct => "product.product",
            Self::AccountMove => "account.move",
            Self::AccountMoveLine => "account.move.line",
        }
    }
}

impl std::fmt::Display for RemoteModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale.order" => Ok(Self::SaleOrder),
            "res.partner" => Ok(Self::ResPartner),
            "product.product" => Ok(Self::ProductProduct),
            "account.move" => Ok(Self::AccountMove),
            "account.move.line" => Ok(Self::AccountMoveLine),
            other => Err(CoreError::UnknownRemoteModel(other.to_string())),
        }
    }
}

/// Sync state of one (entity, remote model) mapping.
///
/// Transitions: `unsynced -> pending -> {synced | error}`. `error` rows are
/// picked up again by the next batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Unsynced,
    Pending,
    Synced,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsynced => "unsynced",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }

    /// Whether a batch run should (re)attempt an entity in this state.
    #[must_use]
    pub const fn needs_sync(self) -> bool {
        !matches!(self, Self::Synced)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsynced" => Ok(Self::Unsynced),
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(CoreError::UnknownSyncStatus(other.to_string())),
        }
    }
}
