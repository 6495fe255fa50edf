//! `netrpc.toml`: optional file configuration for the CLI.
//!
//! ```toml
//! credential = "YOUR_PROJECT_ID"
//!
//! [network]
//! type = "ropsten"            # or: type = "rpc", rpc_url = "...", chain_id = "0x539"
//!
//! [retry]
//! initial_backoff_ms = 250
//! max_backoff_ms = 2000
//! multiplier = 2.0
//!
//! [tracker]
//! poll_interval_ms = 20000
//! warm_block_cache = true
//!
//! [http]
//! timeout_ms = 30000
//!
//! [log]
//! level = "info"
//! format = "text"             # or "json"
//! components = { netrpc_core = "debug" }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use netrpc_core::policy::RetryConfig;
use netrpc_http::HttpGatewayConfig;
use netrpc_network::{BlockTrackerConfig, ControllerConfig, NetworkConfiguration};

use crate::logging::LogConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub credential: Option<String>,
    pub network: Option<NetworkConfiguration>,
    pub retry: RetrySection,
    pub tracker: TrackerSection,
    pub http: HttpSection,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            initial_backoff_ms: defaults.initial_backoff.as_millis() as u64,
            max_backoff_ms: defaults.max_backoff.as_millis() as u64,
            multiplier: defaults.multiplier,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerSection {
    pub poll_interval_ms: u64,
    pub warm_block_cache: bool,
}

impl Default for TrackerSection {
    fn default() -> Self {
        let defaults = BlockTrackerConfig::default();
        Self {
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            warm_block_cache: defaults.warm_block_cache,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    pub timeout_ms: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_ms: HttpGatewayConfig::default().request_timeout.as_millis() as u64,
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn controller(&self, credential: Option<String>) -> ControllerConfig {
        ControllerConfig {
            credential: credential
                .or_else(|| self.credential.clone())
                .unwrap_or_default(),
            retry: RetryConfig {
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
                multiplier: self.retry.multiplier,
            },
            tracker: BlockTrackerConfig {
                poll_interval: Duration::from_millis(self.tracker.poll_interval_ms.max(1)),
                warm_block_cache: self.tracker.warm_block_cache,
            },
        }
    }

    pub fn http(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            request_timeout: Duration::from_millis(self.http.timeout_ms),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses() {
        let cfg: FileConfig = toml::from_str(
            r#"
            credential = "abc"

            [network]
            type = "rpc"
            rpc_url = "http://localhost:8545"
            chain_id = "0x539"

            [retry]
            initial_backoff_ms = 10
            max_backoff_ms = 40
            multiplier = 3.0

            [tracker]
            poll_interval_ms = 500

            [log]
            level = "debug"
            components = { netrpc_core = "trace" }
            "#,
        )
        .unwrap();

        assert_eq!(cfg.network.as_ref().unwrap().chain_id(), "0x539");
        let controller = cfg.controller(None);
        assert_eq!(controller.credential, "abc");
        assert_eq!(controller.retry.initial_backoff, Duration::from_millis(10));
        assert_eq!(controller.tracker.poll_interval, Duration::from_millis(500));
        assert!(controller.tracker.warm_block_cache);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn flag_credential_wins() {
        let cfg: FileConfig = toml::from_str(r#"credential = "from-file""#).unwrap();
        assert_eq!(cfg.controller(Some("from-flag".into())).credential, "from-flag");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert!(cfg.network.is_none());
        assert_eq!(cfg.http().request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.controller(None).tracker.poll_interval, Duration::from_secs(20));
    }

    #[test]
    fn unknown_network_is_an_error() {
        let parsed: Result<FileConfig, _> = toml::from_str("[network]\ntype = \"morden\"\n");
        assert!(parsed.is_err());
    }
}
