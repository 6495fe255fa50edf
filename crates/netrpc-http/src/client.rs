//! HTTP gateway transport backed by `reqwest`.
//!
//! One POST per call. Status codes and bodies are handed back untouched;
//! retrying and classification happen in `netrpc-core`'s retry stage.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;

use netrpc_core::error::RpcError;
use netrpc_core::request::JsonRpcRequest;
use netrpc_core::transport::{GatewayOutcome, GatewayTransport, TransportFailure};

/// Configuration for `HttpGateway`.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("netrpc/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Single-shot JSON-RPC over HTTP(S).
pub struct HttpGateway {
    url: String,
    http: reqwest::Client,
}

impl HttpGateway {
    /// Create a gateway for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RpcError::Setup(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::new(url, &HttpGatewayConfig::default())
    }
}

#[async_trait]
impl GatewayTransport for HttpGateway {
    async fn round_trip(&self, req: &JsonRpcRequest) -> GatewayOutcome {
        let resp = match self.http.post(&self.url).json(req).send().await {
            Ok(resp) => resp,
            Err(e) => return GatewayOutcome::TransportError(transport_failure(&e)),
        };

        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => GatewayOutcome::HttpResponse { status, body },
            Err(e) => GatewayOutcome::TransportError(transport_failure(&e)),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Map a reqwest error onto the transport failure kinds the retry stage knows.
fn transport_failure(err: &reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return TransportFailure::Timeout,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return TransportFailure::ConnectionReset,
                _ => {}
            }
        }
        // hyper reports a peer hang-up mid-response without an io::Error
        let text = cause.to_string();
        if text.contains("connection reset") || text.contains("connection closed before message completed") {
            return TransportFailure::ConnectionReset;
        }
        source = cause.source();
    }

    TransportFailure::Other(err.to_string())
}

/// Builds [`HttpGateway`]s for a given endpoint URL.
#[derive(Debug, Clone, Default)]
pub struct HttpGatewayFactory {
    pub config: HttpGatewayConfig,
}

impl HttpGatewayFactory {
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self { config }
    }

    /// Build a gateway for `url` with this factory's configuration.
    pub fn build(&self, url: &str) -> Result<HttpGateway, RpcError> {
        HttpGateway::new(url, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn request() -> JsonRpcRequest {
        JsonRpcRequest::new(42, "eth_blockNumber", vec![])
    }

    #[tokio::test]
    async fn passes_status_and_body_through() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber", "id": 42})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":42,"result":"0x10"}"#)
            .create_async()
            .await;

        let gateway = HttpGateway::default_for(server.url()).unwrap();
        let outcome = gateway.round_trip(&request()).await;
        assert_eq!(
            outcome,
            GatewayOutcome::ok(r#"{"jsonrpc":"2.0","id":42,"result":"0x10"}"#)
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_statuses_are_not_interpreted() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let gateway = HttpGateway::default_for(server.url()).unwrap();
        assert_eq!(
            gateway.round_trip(&request()).await,
            GatewayOutcome::status(503, "upstream unavailable")
        );
    }

    #[tokio::test]
    async fn non_json_ok_body_is_returned_verbatim() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("Not Found")
            .create_async()
            .await;

        let gateway = HttpGateway::default_for(server.url()).unwrap();
        assert_eq!(gateway.round_trip(&request()).await, GatewayOutcome::ok("Not Found"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let gateway = HttpGateway::new(
            "http://127.0.0.1:9",
            &HttpGatewayConfig {
                request_timeout: Duration::from_secs(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            gateway.round_trip(&request()).await,
            GatewayOutcome::TransportError(_)
        ));
    }

    #[test]
    fn factory_keeps_url() {
        let factory = HttpGatewayFactory::default();
        let gateway = factory.build("https://ropsten.infura.io/v3/abc").unwrap();
        assert_eq!(gateway.url(), "https://ropsten.infura.io/v3/abc");
    }
}
