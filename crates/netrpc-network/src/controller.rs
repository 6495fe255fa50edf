//! Network controller: owns the active engine/tracker pair.
//!
//! State machine:
//! ```text
//! Uninitialized ──set_provider_config──▶ Configured ──▶ ProviderActive
//!        ▲                                                  │
//!        └──────────────────── destroy ◀────────────────────┘
//! ProviderActive ──set_provider_config──▶ (teardown) ──▶ ProviderActive
//! ```
//!
//! Every configuration change tears the old pair down (tracker stopped,
//! engine retired) and builds a fresh one. Stages capture the chain id and
//! gateway URL at construction, so nothing is reconfigured in place.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use tokio::sync::{broadcast, watch};

use netrpc_core::engine::ProviderEngine;
use netrpc_core::error::RpcError;
use netrpc_core::policy::{RetryConfig, RetryPolicy};
use netrpc_core::stages::{BlockNotFoundRewrite, NetworkShortcuts, RetryStage, TracingStage};
use netrpc_core::transport::GatewayTransport;
use netrpc_http::{HttpGatewayConfig, HttpGatewayFactory};

use crate::config::NetworkConfiguration;
use crate::tracker::{BlockTracker, BlockTrackerConfig};

/// Builds a gateway transport for an endpoint URL.
pub trait GatewayFactory: Send + Sync + 'static {
    fn connect(&self, url: &str) -> Result<Arc<dyn GatewayTransport>, RpcError>;
}

impl GatewayFactory for HttpGatewayFactory {
    fn connect(&self, url: &str) -> Result<Arc<dyn GatewayTransport>, RpcError> {
        Ok(Arc::new(self.build(url)?))
    }
}

/// Settings applied to every engine the controller builds.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Credential completing hosted gateway URLs (e.g. a project id).
    pub credential: String,
    pub retry: RetryConfig,
    pub tracker: BlockTrackerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Configured,
    ProviderActive,
}

/// Result of the last [`NetworkController::lookup_network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkStatus {
    Loading,
    Available(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A new engine/tracker pair is active.
    NetworkDidChange { network: String, chain_id: String },
}

struct ActiveProvider {
    engine: Arc<ProviderEngine>,
    tracker: Arc<BlockTracker>,
}

impl ActiveProvider {
    fn teardown(&self) {
        self.tracker.stop();
        self.engine.retire();
    }
}

/// Single owner of "which network is current".
///
/// Readers go through lock-free snapshots; only configuration changes are
/// serialized.
pub struct NetworkController {
    settings: ControllerConfig,
    gateways: Arc<dyn GatewayFactory>,
    config: ArcSwapOption<NetworkConfiguration>,
    active: ArcSwapOption<ActiveProvider>,
    status: watch::Sender<NetworkStatus>,
    events: broadcast::Sender<NetworkEvent>,
    switching: Mutex<()>,
}

impl NetworkController {
    /// Controller using the HTTP gateway.
    pub fn new(settings: ControllerConfig, http: HttpGatewayConfig) -> Self {
        Self::with_gateways(settings, Arc::new(HttpGatewayFactory::new(http)))
    }

    /// Controller using a custom gateway factory.
    pub fn with_gateways(settings: ControllerConfig, gateways: Arc<dyn GatewayFactory>) -> Self {
        let (status, _) = watch::channel(NetworkStatus::Loading);
        let (events, _) = broadcast::channel(16);
        Self {
            settings,
            gateways,
            config: ArcSwapOption::empty(),
            active: ArcSwapOption::empty(),
            status,
            events,
            switching: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ControllerState {
        match (self.config.load().is_some(), self.active.load().is_some()) {
            (_, true) => ControllerState::ProviderActive,
            (true, false) => ControllerState::Configured,
            (false, false) => ControllerState::Uninitialized,
        }
    }

    /// The configuration the active pair was built for.
    pub fn provider_config(&self) -> Option<Arc<NetworkConfiguration>> {
        self.config.load_full()
    }

    /// Switch to `config`: tear down the current pair and build a new one.
    ///
    /// The new pair is fully built before it replaces the current one in a
    /// single swap, so an invalid configuration (or a call made outside a
    /// Tokio runtime) leaves the current pair untouched.
    pub fn set_provider_config(&self, config: NetworkConfiguration) -> Result<(), RpcError> {
        let _switching = self.switching.lock().unwrap_or_else(PoisonError::into_inner);

        let url = config.endpoint(&self.settings.credential)?;
        let gateway = self.gateways.connect(&url)?;
        let engine = Arc::new(build_engine(&config, gateway, &self.settings.retry));
        let tracker = Arc::new(BlockTracker::start(
            engine.clone(),
            self.settings.tracker.clone(),
        )?);

        // Readers see either the old pair or the new one, never neither.
        let config = Arc::new(config);
        self.config.store(Some(config.clone()));
        let previous = self
            .active
            .swap(Some(Arc::new(ActiveProvider { engine, tracker })));
        if let Some(old) = previous {
            old.teardown();
        }
        self.status.send_replace(NetworkStatus::Loading);

        tracing::info!(
            network = %config.type_name(),
            chain_id = %config.chain_id(),
            "network provider activated"
        );
        let _ = self.events.send(NetworkEvent::NetworkDidChange {
            network: config.type_name().to_string(),
            chain_id: config.chain_id().to_string(),
        });
        Ok(())
    }

    /// Shorthand for a built-in network.
    pub fn set_provider_type(&self, name: &str) -> Result<(), RpcError> {
        self.set_provider_config(NetworkConfiguration::known(name)?)
    }

    /// Shorthand for a custom endpoint.
    pub fn set_rpc_target(&self, rpc_url: &str, chain_id: &str) -> Result<(), RpcError> {
        self.set_provider_config(NetworkConfiguration::rpc(rpc_url, chain_id)?)
    }

    /// The active engine and its block tracker.
    pub fn get_provider_and_block_tracker(
        &self,
    ) -> Result<(Arc<ProviderEngine>, Arc<BlockTracker>), RpcError> {
        self.active
            .load_full()
            .map(|active| (active.engine.clone(), active.tracker.clone()))
            .ok_or(RpcError::NotConfigured)
    }

    /// Resolve the network id via `net_version` and publish it.
    pub async fn lookup_network(&self) -> Result<NetworkStatus, RpcError> {
        let (engine, _) = self.get_provider_and_block_tracker()?;
        self.status.send_replace(NetworkStatus::Loading);

        let status = match engine.call::<String>("net_version", vec![]).await {
            Ok(id) => NetworkStatus::Available(id),
            Err(RpcError::EngineReplaced) => return Err(RpcError::EngineReplaced),
            Err(e) => {
                tracing::warn!(network = %engine.label(), error = %e, "network lookup failed");
                NetworkStatus::Unavailable
            }
        };

        // A switch may have happened while we were waiting.
        if engine.is_retired() {
            return Err(RpcError::EngineReplaced);
        }
        self.status.send_replace(status.clone());
        Ok(status)
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }

    /// Tear down the active pair and forget the configuration.
    pub fn destroy(&self) {
        let _switching = self.switching.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = self.active.swap(None) {
            old.teardown();
            tracing::info!(network = %old.engine.label(), "network provider destroyed");
        }
        self.config.store(None);
        self.status.send_replace(NetworkStatus::Loading);
    }
}

impl Drop for NetworkController {
    fn drop(&mut self) {
        if let Some(old) = self.active.swap(None) {
            old.teardown();
        }
    }
}

/// Assemble the standard pipeline for `config` on top of `gateway`:
/// tracing → network shortcuts → retry → block-not-found rewrite → gateway.
pub fn build_engine(
    config: &NetworkConfiguration,
    gateway: Arc<dyn GatewayTransport>,
    retry: &RetryConfig,
) -> ProviderEngine {
    ProviderEngine::builder()
        .label(config.type_name())
        .stage(TracingStage::new(config.type_name()))
        .stage(NetworkShortcuts::new(
            config.chain_id(),
            config.network_id().map(str::to_string),
        ))
        .stage(RetryStage::new(
            Arc::new(BlockNotFoundRewrite::new(gateway)),
            RetryPolicy::new(retry.clone()),
        ))
        .build()
}
