//! Errors surfaced to callers of the provider engine.

use thiserror::Error;

use crate::classify::FailureClass;
use crate::request::JsonRpcError;

/// Errors that can occur while submitting a request through a provider engine.
///
/// Transient gateway failures never appear here directly: the retry stage
/// absorbs them and only reports [`RpcError::RetriesExhausted`] once the
/// attempt ceiling is hit.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The gateway rejected the method (HTTP 405). Permanent, never retried.
    #[error("The method does not exist / is not available.")]
    MethodNotFound,

    /// The gateway is throttling us (HTTP 429). Terminal at this layer.
    #[error("Request is being rate limited.")]
    RateLimited,

    /// Every allowed attempt failed with a transient classification.
    #[error("cannot complete request: all retries exhausted ({attempts} attempts, last failure: {last})")]
    RetriesExhausted { attempts: u32, last: FailureClass },

    /// Gateway failure outside the known classifications (unexpected status,
    /// DNS failure, connection refused, ...). Not retried.
    #[error("gateway request failed: {0}")]
    Gateway(String),

    /// No network configuration has been set on the controller yet.
    #[error("no network configuration has been set")]
    NotConfigured,

    /// The engine was retired by a network switch while the request was in flight.
    #[error("provider was replaced by a network change before the request completed")]
    EngineReplaced,

    /// A network configuration could not be built.
    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),

    /// A gateway client could not be constructed.
    #[error("gateway setup failed: {0}")]
    Setup(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}
