//! netrpc-http: HTTP(S) gateway transport for NetRPC.

pub mod client;

pub use client::{HttpGateway, HttpGatewayConfig, HttpGatewayFactory};
