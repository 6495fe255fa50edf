//! netrpc-core: wire types, failure classification and the provider engine.
//!
//! # Overview
//!
//! NetRPC turns a wallet's "which network am I on" selection into a live
//! JSON-RPC pipeline. The core crate defines:
//!
//! - [`ProviderEngine`]: the single object callers submit requests to
//! - [`Stage`]: one unit of the engine's ordered middleware pipeline
//! - [`GatewayTransport`]: one raw round trip to a remote gateway
//! - [`classify`]: maps a raw outcome to a [`FailureClass`]
//! - [`policy`] module: the capped retry/backoff policy
//! - [`stages`] module: network shortcuts, block-not-found rewrite, retry, tracing
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`RpcError`]: what callers can see go wrong

pub mod classify;
pub mod engine;
pub mod error;
pub mod policy;
pub mod request;
pub mod stages;
pub mod transport;

pub use classify::{classify, Failure, FailureClass};
pub use engine::{Next, ProviderEngine, ProviderEngineBuilder, Stage};
pub use error::RpcError;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::{GatewayOutcome, GatewayTransport, HealthStatus, TransportFailure};
