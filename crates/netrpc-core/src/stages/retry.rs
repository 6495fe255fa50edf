//! Terminal stage: classify gateway outcomes and retry transient failures.

use std::sync::Arc;

use async_trait::async_trait;

use crate::classify::{classify, FailureClass};
use crate::engine::{Next, Stage};
use crate::error::RpcError;
use crate::policy::RetryPolicy;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::GatewayTransport;

/// Turns up to [`MAX_ATTEMPTS`](crate::policy::MAX_ATTEMPTS) gateway round
/// trips into one logical outcome.
///
/// Retry state lives on the stack of each call, so concurrent requests
/// never share it.
pub struct RetryStage {
    transport: Arc<dyn GatewayTransport>,
    policy: RetryPolicy,
}

impl RetryStage {
    pub fn new(transport: Arc<dyn GatewayTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run the retry loop for one request.
    pub async fn execute(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let mut state = self.policy.start();
        loop {
            let failure = match classify(self.transport.round_trip(req).await) {
                Ok(resp) => return Ok(resp),
                Err(failure) => failure,
            };

            match failure.class {
                FailureClass::MethodNotFound => return Err(RpcError::MethodNotFound),
                FailureClass::RateLimited => return Err(RpcError::RateLimited),
                FailureClass::Unclassified => return Err(RpcError::Gateway(failure.detail)),
                class => {
                    state.record_failure(&self.policy);
                    if state.is_exhausted() {
                        tracing::error!(
                            attempts = state.attempts_made,
                            class = %class,
                            error = %failure.detail,
                            method = %req.method,
                            url = %self.transport.url(),
                            "max retries exceeded"
                        );
                        return Err(RpcError::RetriesExhausted {
                            attempts: state.attempts_made,
                            last: class,
                        });
                    }
                    tracing::warn!(
                        attempt = state.attempts_made,
                        delay_ms = state.next_delay.as_millis() as u64,
                        class = %class,
                        error = %failure.detail,
                        method = %req.method,
                        url = %self.transport.url(),
                        "retrying request"
                    );
                    tokio::time::sleep(state.next_delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl Stage for RetryStage {
    async fn handle(
        &self,
        req: JsonRpcRequest,
        _next: Next<'_>,
    ) -> Result<JsonRpcResponse, RpcError> {
        self.execute(&req).await
    }

    fn name(&self) -> &'static str {
        "retry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProviderEngine;
    use crate::policy::{RetryConfig, MAX_ATTEMPTS};
    use crate::stages::{BlockNotFoundRewrite, NetworkShortcuts};
    use crate::transport::{GatewayOutcome, TransportFailure};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const OK_BODY: &str = r#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#;

    /// Replays a script of outcomes, then repeats the last one.
    struct Scripted {
        script: Mutex<VecDeque<GatewayOutcome>>,
        last: GatewayOutcome,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<GatewayOutcome>) -> Arc<Self> {
            let last = script.last().cloned().unwrap_or_else(|| GatewayOutcome::ok(OK_BODY));
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GatewayTransport for Scripted {
        async fn round_trip(&self, _req: &JsonRpcRequest) -> GatewayOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.last.clone())
        }
        fn url(&self) -> &str {
            "mock://scripted"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        })
    }

    fn retryable_outcomes() -> Vec<(FailureClass, GatewayOutcome)> {
        vec![
            (FailureClass::ServiceUnavailable, GatewayOutcome::status(503, "Service Unavailable")),
            (FailureClass::GatewayTimeout, GatewayOutcome::status(504, "Gateway timeout")),
            (FailureClass::TransportTimeout, GatewayOutcome::TransportError(TransportFailure::Timeout)),
            (FailureClass::ConnectionReset, GatewayOutcome::TransportError(TransportFailure::ConnectionReset)),
            (FailureClass::NonJsonBody, GatewayOutcome::ok("<html>oops</html>")),
        ]
    }

    fn request() -> JsonRpcRequest {
        JsonRpcRequest::new(1, "eth_getBalance", vec![json!("0xabc"), json!("latest")])
    }

    #[tokio::test]
    async fn four_failures_then_success_returns_result() {
        for (class, failure) in retryable_outcomes() {
            let mut script = vec![failure; (MAX_ATTEMPTS - 1) as usize];
            script.push(GatewayOutcome::ok(OK_BODY));
            let gateway = Scripted::new(script);
            let stage = RetryStage::new(gateway.clone(), fast_policy());

            let resp = stage.execute(&request()).await.unwrap_or_else(|e| {
                panic!("{class}: expected success, got {e}")
            });
            assert_eq!(resp.result, Some(json!("0x2a")), "{class}");
            assert_eq!(gateway.calls(), MAX_ATTEMPTS as usize, "{class}");
        }
    }

    #[tokio::test]
    async fn five_failures_exhaust_without_a_sixth_attempt() {
        for (class, failure) in retryable_outcomes() {
            let mut script = vec![failure; MAX_ATTEMPTS as usize];
            script.push(GatewayOutcome::ok(OK_BODY));
            let gateway = Scripted::new(script);
            let stage = RetryStage::new(gateway.clone(), fast_policy());

            let err = stage.execute(&request()).await.unwrap_err();
            match err {
                RpcError::RetriesExhausted { attempts, last } => {
                    assert_eq!(attempts, MAX_ATTEMPTS, "{class}");
                    assert_eq!(last, class);
                }
                other => panic!("{class}: unexpected error {other}"),
            }
            assert_eq!(gateway.calls(), MAX_ATTEMPTS as usize, "{class}");
        }
    }

    #[tokio::test]
    async fn method_not_found_fails_on_first_attempt() {
        let gateway = Scripted::new(vec![GatewayOutcome::status(405, ""), GatewayOutcome::ok(OK_BODY)]);
        let stage = RetryStage::new(gateway.clone(), fast_policy());
        let err = stage.execute(&request()).await.unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound));
        assert_eq!(err.to_string(), "The method does not exist / is not available.");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn rate_limit_fails_on_first_attempt() {
        let gateway = Scripted::new(vec![GatewayOutcome::status(429, ""), GatewayOutcome::ok(OK_BODY)]);
        let stage = RetryStage::new(gateway.clone(), fast_policy());
        let err = stage.execute(&request()).await.unwrap_err();
        assert!(matches!(err, RpcError::RateLimited));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn unclassified_failure_is_not_retried() {
        let gateway = Scripted::new(vec![
            GatewayOutcome::TransportError(TransportFailure::Other("dns error".into())),
            GatewayOutcome::ok(OK_BODY),
        ]);
        let stage = RetryStage::new(gateway.clone(), fast_policy());
        let err = stage.execute(&request()).await.unwrap_err();
        assert!(matches!(err, RpcError::Gateway(ref msg) if msg.contains("dns error")));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn node_error_envelope_is_returned_not_retried() {
        let gateway = Scripted::new(vec![GatewayOutcome::ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#,
        )]);
        let stage = RetryStage::new(gateway.clone(), fast_policy());
        let resp = stage.execute(&request()).await.unwrap();
        assert_eq!(resp.error.unwrap().message, "header not found");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn not_found_block_is_normalized_through_the_full_pipeline() {
        let gateway = Scripted::new(vec![GatewayOutcome::ok("Not Found")]);
        let engine = ProviderEngine::builder()
            .stage(NetworkShortcuts::new("0x4", Some("ropsten".into())))
            .stage(RetryStage::new(
                Arc::new(BlockNotFoundRewrite::new(gateway.clone())),
                fast_policy(),
            ))
            .build();

        let resp = engine
            .submit(JsonRpcRequest::new(5, "eth_getBlockByNumber", vec![json!("0x10"), json!(false)]))
            .await
            .unwrap();
        assert_eq!(resp.result, Some(Value::Null));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_keep_separate_retry_state() {
        let flaky = Scripted::new(vec![
            GatewayOutcome::status(503, ""),
            GatewayOutcome::status(503, ""),
            GatewayOutcome::ok(OK_BODY),
        ]);
        let stage = Arc::new(RetryStage::new(flaky.clone(), fast_policy()));
        let (req_a, req_b) = (request(), request());
        let (a, b) = tokio::join!(stage.execute(&req_a), stage.execute(&req_b));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(flaky.calls() <= 4);
    }
}
