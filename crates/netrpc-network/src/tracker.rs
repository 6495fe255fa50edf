//! Block tracker: polls the engine for the chain head on an interval.
//!
//! Polls go through the same [`ProviderEngine`] ordinary callers use, so
//! they see the same retry and normalization behavior. Each poll issues:
//!
//! 1. `eth_blockNumber`
//! 2. `eth_getBlockByNumber("latest")` and `eth_getBlockByNumber(<head>)`
//!    when cache warming is enabled
//!
//! The head is published as soon as `eth_blockNumber` answers; a failed
//! warming fetch is logged and does not count against the poll.
//!
//! The tracker runs on its own task and never blocks request submission.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use netrpc_core::engine::ProviderEngine;
use netrpc_core::error::RpcError;
use netrpc_core::transport::HealthStatus;

/// Configuration for the block tracker.
#[derive(Debug, Clone)]
pub struct BlockTrackerConfig {
    /// Time between polls. The first poll runs immediately.
    pub poll_interval: Duration,
    /// Also fetch the head block objects after each `eth_blockNumber`.
    pub warm_block_cache: bool,
}

impl Default for BlockTrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            warm_block_cache: true,
        }
    }
}

#[derive(Default)]
struct TrackerShared {
    latest_block: RwLock<Option<Value>>,
    health: RwLock<Option<HealthStatus>>,
}

/// Periodic chain-head poller bound to one engine.
///
/// Polling stops on [`BlockTracker::stop`] or when the tracker is dropped.
pub struct BlockTracker {
    label: String,
    head: watch::Receiver<Option<u64>>,
    shared: Arc<TrackerShared>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BlockTracker {
    /// Spawn the polling task on the current Tokio runtime.
    ///
    /// Fails with [`RpcError::Setup`] when called outside a runtime.
    pub fn start(
        engine: Arc<ProviderEngine>,
        config: BlockTrackerConfig,
    ) -> Result<Self, RpcError> {
        let runtime = Handle::try_current()
            .map_err(|e| RpcError::Setup(format!("block tracker needs a Tokio runtime: {e}")))?;
        let label = engine.label().to_string();
        let (head_tx, head_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(TrackerShared::default());

        tracing::info!(
            network = %label,
            interval_ms = config.poll_interval.as_millis() as u64,
            "block tracker starting"
        );

        let task = runtime.spawn(poll_loop(
            engine,
            config,
            head_tx,
            shared.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            label,
            head: head_rx,
            shared,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// Highest block number observed so far.
    pub fn latest_block_number(&self) -> Option<u64> {
        *self.head.borrow()
    }

    /// Most recent block object fetched while warming the cache.
    pub fn latest_block(&self) -> Option<Value> {
        self.shared
            .latest_block
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Watch the chain head. Updates only when the head advances.
    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.head.clone()
    }

    /// Wait until at least one head has been observed.
    ///
    /// Fails with [`RpcError::EngineReplaced`] if the tracker is stopped
    /// before that happens.
    pub async fn wait_for_latest(&self) -> Result<u64, RpcError> {
        let mut head = self.head.clone();
        loop {
            if let Some(number) = *head.borrow_and_update() {
                return Ok(number);
            }
            if head.changed().await.is_err() {
                return Err(RpcError::EngineReplaced);
            }
        }
    }

    /// Result of the last poll.
    pub fn health(&self) -> HealthStatus {
        self.shared
            .health
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(HealthStatus::Unknown)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop polling. Idempotent; an in-progress poll is abandoned.
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = self.shutdown.send(true);
            task.abort();
            tracing::info!(network = %self.label, "block tracker stopped");
        }
    }
}

impl Drop for BlockTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BlockTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockTracker")
            .field("label", &self.label)
            .field("latest", &self.latest_block_number())
            .field("health", &self.health())
            .finish()
    }
}

async fn poll_loop(
    engine: Arc<ProviderEngine>,
    config: BlockTrackerConfig,
    head: watch::Sender<Option<u64>>,
    shared: Arc<TrackerShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = match poll_once(&engine, &config, &head, &shared).await {
                    Ok(number) => {
                        tracing::trace!(network = %engine.label(), number, "polled head");
                        HealthStatus::Healthy
                    }
                    Err(RpcError::EngineReplaced) => break,
                    Err(e) => {
                        tracing::warn!(network = %engine.label(), error = %e, "block poll failed");
                        HealthStatus::Unhealthy
                    }
                };
                *shared.health.write().unwrap_or_else(PoisonError::into_inner) = Some(status);
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn poll_once(
    engine: &ProviderEngine,
    config: &BlockTrackerConfig,
    head: &watch::Sender<Option<u64>>,
    shared: &TrackerShared,
) -> Result<u64, RpcError> {
    let hex: String = engine.call("eth_blockNumber", vec![]).await?;
    let number = parse_quantity(&hex)?;

    head.send_if_modified(|current| match current {
        Some(seen) if *seen >= number => false,
        _ => {
            *current = Some(number);
            true
        }
    });

    if config.warm_block_cache {
        match fetch_head_block(engine, &hex).await {
            Ok(Some(block)) => {
                *shared.latest_block.write().unwrap_or_else(PoisonError::into_inner) = Some(block);
            }
            Ok(None) => {}
            Err(RpcError::EngineReplaced) => return Err(RpcError::EngineReplaced),
            Err(e) => {
                tracing::warn!(
                    network = %engine.label(),
                    number,
                    error = %e,
                    "block cache warming failed"
                );
            }
        }
    }
    Ok(number)
}

/// Fetch the `latest` block and the block at `hex`, preferring the latter.
async fn fetch_head_block(
    engine: &ProviderEngine,
    hex: &str,
) -> Result<Option<Value>, RpcError> {
    let latest: Value = engine
        .call("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
        .await?;
    let at_head: Value = engine
        .call("eth_getBlockByNumber", vec![json!(hex), json!(false)])
        .await?;
    let block = if at_head.is_null() { latest } else { at_head };
    Ok((!block.is_null()).then_some(block))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(hex: &str) -> Result<u64, RpcError> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Gateway(format!("invalid quantity '{hex}'")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Gateway(format!("invalid quantity '{hex}': {e}")))
}
