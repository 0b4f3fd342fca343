use thiserror::Error;

/// Errors returned by the Odoo JSON-RPC client.
#[derive(Debug, Error)]
pub enum OdooError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Odoo answered with a JSON-RPC `error` object (validation errors,
    /// access errors, missing records, server-side exceptions).
    #[error("Odoo RPC error: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Exception class reported by the server, e.g.
        /// `odoo.exceptions.ValidationError`.
        name: Option<String>,
    },

    /// `common.login` returned `false`.
    #[error("Odoo rejected the credentials for {username} on database {db}")]
    Auth { db: String, username: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid Odoo URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
