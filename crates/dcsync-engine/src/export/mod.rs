//! Exporters for local entities that have an Odoo counterpart.

pub mod order;
pub mod partner;

pub use order::{export_order, wholesale_pricelist};
pub use partner::{ensure_partner, export_partner};
