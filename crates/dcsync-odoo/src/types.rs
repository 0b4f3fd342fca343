//! JSON-RPC 2.0 envelope types for Odoo's `/jsonrpc` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing `call` request.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: RpcParams<'a>,
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct RpcParams<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub args: &'a [Value],
}

impl<'a> RpcRequest<'a> {
    #[must_use]
    pub fn call(id: u64, service: &'a str, method: &'a str, args: &'a [Value]) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id,
        }
    }
}

/// Incoming response. Exactly one of `result` / `error` is set by Odoo.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcFault>,
}

/// The `error` member of a failed call.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcFault {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcFaultData>,
}

/// Server-side exception details. `message` carries the user-facing text,
/// which is more useful than the generic top-level "Odoo Server Error".
#[derive(Debug, Clone, Deserialize)]
pub struct RpcFaultData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
