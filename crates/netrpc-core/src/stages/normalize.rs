//! Network-aware shortcuts and gateway response corrections.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{Next, Stage};
use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{GatewayOutcome, GatewayTransport};

/// Body some gateways send with HTTP 200 when a requested block is unknown.
const BLOCK_NOT_FOUND_BODY: &str = "Not Found";

/// Answers identity methods from the network the engine was built for,
/// without touching the gateway.
///
/// - `eth_chainId` → the configured chain id
/// - `net_version` → the configured network identifier, if one is known;
///   otherwise the request is forwarded
#[derive(Debug, Clone)]
pub struct NetworkShortcuts {
    chain_id: String,
    network_id: Option<String>,
}

impl NetworkShortcuts {
    pub fn new(chain_id: impl Into<String>, network_id: Option<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            network_id,
        }
    }

    fn shortcut(&self, method: &str) -> Option<Value> {
        match method {
            "eth_chainId" => Some(Value::String(self.chain_id.clone())),
            "net_version" => self.network_id.clone().map(Value::String),
            _ => None,
        }
    }
}

#[async_trait]
impl Stage for NetworkShortcuts {
    async fn handle(
        &self,
        req: JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<JsonRpcResponse, RpcError> {
        match self.shortcut(&req.method) {
            Some(value) => {
                tracing::debug!(method = %req.method, id = %req.id, "answered locally");
                Ok(JsonRpcResponse::success(req.id, value))
            }
            None => next.run(req).await,
        }
    }

    fn name(&self) -> &'static str {
        "network-shortcuts"
    }
}

/// Gateway decorator that turns the out-of-band "Not Found" body returned
/// for `eth_getBlockByNumber` into a `null` result.
///
/// It sits below the retry stage so the quirk is corrected before the body
/// is classified, and is never mistaken for a non-JSON response.
pub struct BlockNotFoundRewrite {
    inner: Arc<dyn GatewayTransport>,
}

impl BlockNotFoundRewrite {
    pub fn new(inner: Arc<dyn GatewayTransport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GatewayTransport for BlockNotFoundRewrite {
    async fn round_trip(&self, req: &JsonRpcRequest) -> GatewayOutcome {
        let outcome = self.inner.round_trip(req).await;
        match outcome {
            GatewayOutcome::HttpResponse { status, ref body }
                if req.method == "eth_getBlockByNumber"
                    && (200..300).contains(&status)
                    && body.trim() == BLOCK_NOT_FOUND_BODY =>
            {
                tracing::debug!(id = %req.id, "gateway reported block not found; returning null");
                let body = json!({ "jsonrpc": "2.0", "id": req.id, "result": null }).to_string();
                GatewayOutcome::HttpResponse { status, body }
            }
            other => other,
        }
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}
