//! Odoo JSON-RPC client.
//!
//! [`OdooClient`] speaks the `/jsonrpc` endpoint (`common.login`,
//! `object.execute_kw`). The engine only depends on the [`ErpClient`] trait,
//! so tests can substitute an in-memory ERP.

pub mod client;
pub mod domain;
pub mod erp;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::{OdooClient, OdooSettings};
pub use domain::Domain;
pub use erp::{ErpClient, Record, SearchOptions};
pub use error::OdooError;
