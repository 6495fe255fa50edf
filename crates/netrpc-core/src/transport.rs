//! The `GatewayTransport` trait: one raw round trip to a JSON-RPC gateway.

use async_trait::async_trait;

use crate::request::JsonRpcRequest;

/// Provider health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The last poll succeeded.
    Healthy,
    /// The last poll failed.
    Unhealthy,
    /// Health status is unknown (not yet checked).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A transport-level failure: the request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request timed out.
    Timeout,
    /// The connection was reset or closed mid-request.
    ConnectionReset,
    /// Anything else (DNS, connection refused, TLS, ...).
    Other(String),
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// The uninterpreted result of one gateway round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// The gateway answered; status and body are passed through untouched.
    HttpResponse { status: u16, body: String },
    /// No HTTP response was received.
    TransportError(TransportFailure),
}

impl GatewayOutcome {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::HttpResponse {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpResponse {
            status,
            body: body.into(),
        }
    }
}

/// Issues exactly one JSON-RPC call per invocation.
///
/// Implementations do not retry and do not interpret status codes; that is
/// the retry stage's job. The request (and its id) must be sent unchanged.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn GatewayTransport>`.
#[async_trait]
pub trait GatewayTransport: Send + Sync + 'static {
    /// Perform one round trip.
    async fn round_trip(&self, req: &JsonRpcRequest) -> GatewayOutcome;

    /// Return the transport's endpoint URL.
    fn url(&self) -> &str;
}
