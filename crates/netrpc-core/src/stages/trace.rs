//! Pass-through stage that logs every request with its latency.

use std::time::Instant;

use async_trait::async_trait;

use crate::engine::{Next, Stage};
use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, Clone)]
pub struct TracingStage {
    network: String,
}

impl TracingStage {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
        }
    }
}

#[async_trait]
impl Stage for TracingStage {
    async fn handle(
        &self,
        req: JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<JsonRpcResponse, RpcError> {
        let method = req.method.clone();
        let id = req.id.clone();
        let start = Instant::now();

        let result = next.run(req).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(resp) if resp.error.is_some() => tracing::debug!(
                network = %self.network, %method, %id, elapsed_ms, "request returned rpc error"
            ),
            Ok(_) => tracing::debug!(network = %self.network, %method, %id, elapsed_ms, "request ok"),
            Err(e) => tracing::debug!(
                network = %self.network, %method, %id, elapsed_ms, error = %e, "request failed"
            ),
        }
        result
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
