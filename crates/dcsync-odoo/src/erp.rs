//! The ERP operations the sync engine depends on.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::Domain;
use crate::error::OdooError;

/// A record as read from or written to Odoo: field name → value.
pub type Record = Map<String, Value>;

/// Paging and ordering for `search` / `search_read`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Odoo order clause, e.g. `"id asc"`.
    pub order: Option<String>,
}

impl SearchOptions {
    #[must_use]
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ordered(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    /// Keyword arguments for `execute_kw`.
    #[must_use]
    pub fn to_kwargs(&self) -> Record {
        let mut kwargs = Record::new();
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), Value::from(limit));
        }
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), Value::from(offset));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), Value::from(order.as_str()));
        }
        kwargs
    }
}

/// Remote ERP reachable over RPC.
///
/// Models are Odoo technical names (`sale.order`, `res.partner`, ...).
/// Implementations must not retry application-level failures; a rejected
/// `create` or `write` surfaces as [`OdooError::Rpc`].
#[async_trait]
pub trait ErpClient: Send + Sync {
    /// Ids of records matching `domain`, in Odoo's default order.
    async fn search(&self, model: &str, domain: &Domain) -> Result<Vec<i64>, OdooError> {
        self.search_with(model, domain, &SearchOptions::default())
            .await
    }

    async fn search_with(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<i64>, OdooError>;

    async fn search_count(&self, model: &str, domain: &Domain) -> Result<i64, OdooError>;

    /// Reads `fields` of the given records. Ids that no longer exist are
    /// silently missing from the result.
    async fn read(&self, model: &str, ids: &[i64], fields: &[&str])
        -> Result<Vec<Record>, OdooError>;

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Record>, OdooError>;

    async fn create(&self, model: &str, values: Record) -> Result<i64, OdooError>;

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<bool, OdooError>;

    /// Calls a record method such as `action_cancel` or `button_draft`.
    async fn call_method(&self, model: &str, method: &str, ids: &[i64])
        -> Result<Value, OdooError>;
}

/// Reads an integer id from a field, accepting Odoo's many2one form
/// `[id, "display name"]` as well as a bare integer.
#[must_use]
pub fn many2one_id(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Number(n) => n.as_i64(),
        Value::Array(pair) => pair.first().and_then(Value::as_i64),
        _ => None,
    }
}

/// Reads a string field, treating Odoo's `false` for empty fields as `None`.
#[must_use]
pub fn string_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn search_options_build_kwargs() {
        let kwargs = SearchOptions::limit(2).ordered("id asc").to_kwargs();
        assert_eq!(Value::Object(kwargs), json!({ "limit": 2, "order": "id asc" }));
        assert!(SearchOptions::default().to_kwargs().is_empty());
    }

    #[test]
    fn many2one_accepts_pair_and_bare_id() {
        let r = record(json!({ "partner_id": [7, "Dana Reyes"], "company_id": 1, "user_id": false }));
        assert_eq!(many2one_id(&r, "partner_id"), Some(7));
        assert_eq!(many2one_id(&r, "company_id"), Some(1));
        assert_eq!(many2one_id(&r, "user_id"), None);
        assert_eq!(many2one_id(&r, "missing"), None);
    }

    #[test]
    fn false_string_fields_are_none() {
        let r = record(json!({ "street": false, "city": "Denver" }));
        assert_eq!(string_field(&r, "street"), None);
        assert_eq!(string_field(&r, "city"), Some("Denver"));
    }
}
