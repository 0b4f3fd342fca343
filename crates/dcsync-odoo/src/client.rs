//! HTTP client for Odoo's JSON-RPC endpoint.
//!
//! Wraps `reqwest` with Odoo session handling (a lazily cached `uid` from
//! `common.login`), transport retries, and typed fault reporting. Every model
//! call goes through `object.execute_kw`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use dcsync_core::AppConfig;

use crate::domain::Domain;
use crate::erp::{ErpClient, Record, SearchOptions};
use crate::error::OdooError;
use crate::retry::{is_idempotent, retry_with_backoff};
use crate::types::{RpcRequest, RpcResponse};

const JSONRPC_PATH: &str = "jsonrpc";

/// Connection settings for [`OdooClient`].
#[derive(Clone)]
pub struct OdooSettings {
    pub base_url: String,
    pub db: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl OdooSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.odoo_url.clone(),
            db: config.odoo_db.clone(),
            username: config.odoo_username.clone(),
            password: config.odoo_password.clone(),
            timeout_secs: config.odoo_request_timeout_secs,
            max_retries: config.odoo_max_retries,
            retry_backoff_base_ms: config.odoo_retry_backoff_base_ms,
        }
    }
}

impl std::fmt::Debug for OdooSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooSettings")
            .field("base_url", &self.base_url)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .finish()
    }
}

/// Client for one Odoo database.
///
/// Authentication happens on the first model call and the resulting `uid` is
/// reused for the lifetime of the client.
pub struct OdooClient {
    client: Client,
    endpoint: Url,
    db: String,
    username: String,
    password: String,
    max_retries: u32,
    retry_backoff_base_ms: u64,
    uid: OnceCell<i64>,
    next_request_id: AtomicU64,
}

impl OdooClient {
    /// Builds a client; no request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`OdooError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed, or [`OdooError::InvalidUrl`] if `base_url` does not
    /// parse.
    pub fn new(settings: &OdooSettings) -> Result<Self, OdooError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("dcsync/0.1 (odoo-sync)")
            .build()?;

        // Normalise to exactly one trailing slash so the join below appends
        // rather than replacing the last path segment.
        let normalised = format!("{}/", settings.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&normalised)
            .and_then(|base| base.join(JSONRPC_PATH))
            .map_err(|e| OdooError::InvalidUrl {
                url: settings.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            db: settings.db.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            max_retries: settings.max_retries,
            retry_backoff_base_ms: settings.retry_backoff_base_ms,
            uid: OnceCell::new(),
            next_request_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Authenticated user id, logging in on first use.
    ///
    /// # Errors
    ///
    /// Returns [`OdooError::Auth`] if the credentials are rejected, or any
    /// transport error from the login call.
    pub async fn uid(&self) -> Result<i64, OdooError> {
        self.uid.get_or_try_init(|| self.login()).await.copied()
    }

    /// Calls `common.login` and returns the user id.
    ///
    /// # Errors
    ///
    /// Returns [`OdooError::Auth`] if Odoo answers `false`.
    pub async fn login(&self) -> Result<i64, OdooError> {
        let args = [
            Value::from(self.db.as_str()),
            Value::from(self.username.as_str()),
            Value::from(self.password.as_str()),
        ];
        let result = self
            .call("common", "login", &args, self.max_retries)
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => {
                tracing::info!(db = %self.db, username = %self.username, uid, "logged in to Odoo");
                Ok(uid)
            }
            _ => Err(OdooError::Auth {
                db: self.db.clone(),
                username: self.username.clone(),
            }),
        }
    }

    /// Calls `object.execute_kw` for `model.method(*args, **kwargs)`.
    ///
    /// # Errors
    ///
    /// Returns [`OdooError::Rpc`] when Odoo rejects the call, or a transport
    /// error. Read-only methods are retried first; writes and record actions
    /// are sent once.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Record,
    ) -> Result<Value, OdooError> {
        let uid = self.uid().await?;
        let payload = [
            Value::from(self.db.as_str()),
            Value::from(uid),
            Value::from(self.password.as_str()),
            Value::from(model),
            Value::from(method),
            Value::Array(args),
            Value::Object(kwargs),
        ];

        let retries = if is_idempotent(method) {
            self.max_retries
        } else {
            0
        };
        tracing::debug!(model, method, retries, "odoo execute_kw");
        self.call("object", "execute_kw", &payload, retries).await
    }

    async fn call(
        &self,
        service: &str,
        method: &str,
        args: &[Value],
        max_retries: u32,
    ) -> Result<Value, OdooError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::call(id, service, method, args);

        let body = retry_with_backoff(max_retries, self.retry_backoff_base_ms, || {
            self.post_json(&request)
        })
        .await?;

        unwrap_response(body, &format!("{service}.{method}"))
    }

    /// Sends a POST request, asserts a 2xx HTTP status, and parses the
    /// response body as JSON.
    async fn post_json(&self, request: &RpcRequest<'_>) -> Result<Value, OdooError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| OdooError::Deserialize {
            context: self.endpoint.to_string(),
            source: e,
        })
    }
}

/// Splits a JSON-RPC envelope into its result or a typed fault.
fn unwrap_response(body: Value, context: &str) -> Result<Value, OdooError> {
    let response: RpcResponse =
        serde_json::from_value(body).map_err(|e| OdooError::Deserialize {
            context: context.to_string(),
            source: e,
        })?;

    if let Some(fault) = response.error {
        let (name, detail) = fault
            .data
            .map(|d| (d.name, d.message))
            .unwrap_or_default();
        return Err(OdooError::Rpc {
            code: fault.code,
            message: detail.unwrap_or(fault.message),
            name,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}

fn decode<T: DeserializeOwned>(value: Value, context: &str) -> Result<T, OdooError> {
    serde_json::from_value(value).map_err(|e| OdooError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

fn fields_kwargs(fields: &[&str]) -> Record {
    let mut kwargs = Record::new();
    kwargs.insert(
        "fields".to_string(),
        Value::Array(fields.iter().map(|f| Value::from(*f)).collect()),
    );
    kwargs
}

#[async_trait]
impl ErpClient for OdooClient {
    async fn search_with(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<i64>, OdooError> {
        let result = self
            .execute_kw(model, "search", vec![domain.to_value()], options.to_kwargs())
            .await?;
        decode(result, &format!("{model}.search"))
    }

    async fn search_count(&self, model: &str, domain: &Domain) -> Result<i64, OdooError> {
        let result = self
            .execute_kw(model, "search_count", vec![domain.to_value()], Record::new())
            .await?;
        decode(result, &format!("{model}.search_count"))
    }

    async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Record>, OdooError> {
        let result = self
            .execute_kw(model, "read", vec![Value::from(ids)], fields_kwargs(fields))
            .await?;
        decode(result, &format!("{model}.read"))
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Record>, OdooError> {
        let mut kwargs = fields_kwargs(fields);
        kwargs.extend(options.to_kwargs());
        let result = self
            .execute_kw(model, "search_read", vec![domain.to_value()], kwargs)
            .await?;
        decode(result, &format!("{model}.search_read"))
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, OdooError> {
        let result = self
            .execute_kw(model, "create", vec![Value::Object(values)], Record::new())
            .await?;
        // Newer Odoo versions answer a single-record create with `[id]`.
        let id = match &result {
            Value::Array(ids) => ids.first().and_then(Value::as_i64),
            other => other.as_i64(),
        };
        id.ok_or_else(|| OdooError::Rpc {
            code: 0,
            message: format!("{model}.create returned no id: {result}"),
            name: None,
        })
    }

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<bool, OdooError> {
        let result = self
            .execute_kw(
                model,
                "write",
                vec![Value::from(ids), Value::Object(values)],
                Record::new(),
            )
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn call_method(
        &self,
        model: &str,
        method: &str,
        ids: &[i64],
    ) -> Result<Value, OdooError> {
        self.execute_kw(model, method, vec![Value::from(ids)], Record::new())
            .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
