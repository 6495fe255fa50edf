//! netrpc-network: network selection and lifecycle for NetRPC.
//!
//! - [`networks`]: built-in network table (chain id, gateway host)
//! - [`NetworkConfiguration`]: an immutable network selection
//! - [`BlockTracker`]: polls the chain head through an engine
//! - [`NetworkController`]: builds and tears down engine/tracker pairs
//!
//! # Quick start
//! ```rust,no_run
//! use netrpc_network::{ControllerConfig, NetworkController};
//! use netrpc_http::HttpGatewayConfig;
//!
//! # async fn run() -> Result<(), netrpc_core::RpcError> {
//! let controller = NetworkController::new(
//!     ControllerConfig { credential: "YOUR_PROJECT_ID".into(), ..Default::default() },
//!     HttpGatewayConfig::default(),
//! );
//! controller.set_provider_type("mainnet")?;
//! let (engine, tracker) = controller.get_provider_and_block_tracker()?;
//! let chain_id: String = engine.call("eth_chainId", vec![]).await?;
//! let head = tracker.wait_for_latest().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod networks;
pub mod tracker;

pub use config::{NetworkConfigFile, NetworkConfiguration, NetworkType};
pub use controller::{
    build_engine, ControllerConfig, ControllerState, GatewayFactory, NetworkController,
    NetworkEvent, NetworkStatus,
};
pub use networks::{KnownNetwork, KNOWN_NETWORKS};
pub use tracker::{BlockTracker, BlockTrackerConfig};
