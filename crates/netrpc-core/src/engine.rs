//! The provider engine: an immutable, ordered pipeline of stages.
//!
//! ```text
//! submit(req) → [stage 0] → [stage 1] → … → [terminal stage] → gateway
//! ```
//!
//! Every stage may answer a request itself, forward it through [`Next`] and
//! post-process the response, or forward it unchanged. The last stage must
//! answer; falling off the end of the pipeline is an error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};

/// One unit of the engine's middleware pipeline.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Handle `req`, optionally delegating to the rest of the pipeline.
    async fn handle(
        &self,
        req: JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<JsonRpcResponse, RpcError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// The remainder of the pipeline after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
}

impl<'a> Next<'a> {
    /// Forward `req` to the next stage.
    pub async fn run(self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(req, Next { stages: rest }).await,
            None => Err(RpcError::Gateway(format!(
                "no stage answered {}",
                req.method
            ))),
        }
    }
}

/// Builder for [`ProviderEngine`]. Stages run in the order they are added.
#[derive(Default)]
pub struct ProviderEngineBuilder {
    label: Option<String>,
    stages: Vec<Arc<dyn Stage>>,
}

impl ProviderEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label shown in logs (typically the network name).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> ProviderEngine {
        ProviderEngine {
            label: self.label.unwrap_or_else(|| "engine".into()),
            stages: self.stages.into(),
            next_id: AtomicU64::new(1),
            retired: AtomicBool::new(false),
        }
    }
}

/// The single object callers submit JSON-RPC requests to.
///
/// Holds no retry or network knowledge itself; that lives in its stages.
pub struct ProviderEngine {
    label: String,
    stages: Arc<[Arc<dyn Stage>]>,
    next_id: AtomicU64,
    retired: AtomicBool,
}

impl ProviderEngine {
    pub fn builder() -> ProviderEngineBuilder {
        ProviderEngineBuilder::new()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stage names in pipeline order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Submit one request through the pipeline.
    ///
    /// A request with a null id is assigned a fresh one. If the engine is
    /// retired while the request is in flight, the result is discarded and
    /// [`RpcError::EngineReplaced`] is returned instead.
    pub async fn submit(&self, mut req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        if self.is_retired() {
            return Err(RpcError::EngineReplaced);
        }
        if req.id.is_null() {
            req.id = RpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        }
        if req.jsonrpc != "2.0" {
            req.jsonrpc = "2.0".into();
        }

        let method = req.method.clone();
        let result = Next {
            stages: &self.stages[..],
        }
        .run(req)
        .await;

        if self.is_retired() {
            tracing::debug!(
                engine = %self.label,
                method = %method,
                "discarding result from retired engine"
            );
            return Err(RpcError::EngineReplaced);
        }
        result
    }

    /// Submit several requests concurrently. Responses come back in input
    /// order; one failure does not affect the others.
    pub async fn submit_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Vec<Result<JsonRpcResponse, RpcError>> {
        future::join_all(reqs.into_iter().map(|req| self.submit(req))).await
    }

    /// Convenience: call a method and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let resp = self.submit(JsonRpcRequest::unnumbered(method, params)).await?;
        let result = resp.into_result().map_err(RpcError::Rpc)?;
        serde_json::from_value(result).map_err(RpcError::Deserialization)
    }

    /// Mark the engine as replaced. In-flight requests run to completion but
    /// their results are discarded; new submissions fail immediately.
    pub fn retire(&self) {
        if !self.retired.swap(true, Ordering::SeqCst) {
            tracing::debug!(engine = %self.label, "engine retired");
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProviderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEngine")
            .field("label", &self.label)
            .field("stages", &self.stage_names())
            .field("retired", &self.is_retired())
            .finish()
    }
}
