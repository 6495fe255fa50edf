//! Network configuration: immutable once built.

use serde::Deserialize;
use url::Url;

use netrpc_core::error::RpcError;

use crate::networks::{self, KnownNetwork};

/// Name used for user-supplied endpoints.
pub const RPC_TYPE: &str = "rpc";

/// Which kind of network a configuration points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// A built-in network; identity comes from the lookup table.
    Known(&'static KnownNetwork),
    /// A caller-supplied endpoint.
    Rpc,
}

/// A network selection. A change of network builds a new value; there is
/// no way to edit one in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "NetworkConfigFile")]
pub struct NetworkConfiguration {
    network_type: NetworkType,
    rpc_url: Option<String>,
    chain_id: String,
}

impl NetworkConfiguration {
    /// Configuration for a built-in network.
    pub fn known(name: &str) -> Result<Self, RpcError> {
        let network = networks::lookup(name)
            .ok_or_else(|| RpcError::InvalidConfig(format!("unknown network '{name}'")))?;
        Ok(Self {
            network_type: NetworkType::Known(network),
            rpc_url: None,
            chain_id: network.chain_id.to_string(),
        })
    }

    /// Configuration for a custom endpoint. Both fields are required.
    pub fn rpc(rpc_url: &str, chain_id: &str) -> Result<Self, RpcError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| RpcError::InvalidConfig(format!("invalid rpc url '{rpc_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RpcError::InvalidConfig(format!(
                "rpc url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        validate_chain_id(chain_id)?;
        Ok(Self {
            network_type: NetworkType::Rpc,
            rpc_url: Some(rpc_url.to_string()),
            chain_id: chain_id.to_ascii_lowercase(),
        })
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    /// The network name, or `"rpc"` for custom endpoints.
    pub fn type_name(&self) -> &str {
        match self.network_type {
            NetworkType::Known(network) => network.name,
            NetworkType::Rpc => RPC_TYPE,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Identifier answered locally for `net_version`; `None` means ask the
    /// gateway.
    pub fn network_id(&self) -> Option<&str> {
        match self.network_type {
            NetworkType::Known(network) => Some(network.name),
            NetworkType::Rpc => None,
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    /// Resolve the gateway URL. Known networks need a non-empty credential.
    pub fn endpoint(&self, credential: &str) -> Result<String, RpcError> {
        match (self.network_type, &self.rpc_url) {
            (NetworkType::Known(network), _) => {
                if credential.trim().is_empty() {
                    return Err(RpcError::InvalidConfig(format!(
                        "a gateway credential is required for '{}'",
                        network.name
                    )));
                }
                Ok(network.gateway_url(credential.trim()))
            }
            (NetworkType::Rpc, Some(url)) => Ok(url.clone()),
            (NetworkType::Rpc, None) => Err(RpcError::InvalidConfig("rpc url missing".into())),
        }
    }
}

impl std::fmt::Display for NetworkConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rpc_url {
            Some(url) => write!(f, "rpc {url} (chain {})", self.chain_id),
            None => write!(f, "{} (chain {})", self.type_name(), self.chain_id),
        }
    }
}

fn validate_chain_id(chain_id: &str) -> Result<(), RpcError> {
    let digits = chain_id
        .strip_prefix("0x")
        .or_else(|| chain_id.strip_prefix("0X"))
        .ok_or_else(|| RpcError::InvalidConfig(format!("chain id '{chain_id}' must be 0x-prefixed hex")))?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RpcError::InvalidConfig(format!(
            "chain id '{chain_id}' is not valid hex"
        )));
    }
    Ok(())
}

/// File / serde shape: `type = "ropsten"` or `type = "rpc"` with
/// `rpc_url` and `chain_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfigFile {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
}

impl TryFrom<NetworkConfigFile> for NetworkConfiguration {
    type Error = RpcError;

    fn try_from(file: NetworkConfigFile) -> Result<Self, Self::Error> {
        if file.kind != RPC_TYPE {
            return Self::known(&file.kind);
        }
        let url = file
            .rpc_url
            .ok_or_else(|| RpcError::InvalidConfig("type 'rpc' requires rpc_url".into()))?;
        let chain_id = file
            .chain_id
            .ok_or_else(|| RpcError::InvalidConfig("type 'rpc' requires chain_id".into()))?;
        Self::rpc(&url, &chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_network_takes_identity_from_table() {
        let cfg = NetworkConfiguration::known("ropsten").unwrap();
        assert_eq!(cfg.chain_id(), "0x4");
        assert_eq!(cfg.network_id(), Some("ropsten"));
        assert_eq!(cfg.type_name(), "ropsten");
        assert_eq!(
            cfg.endpoint("abc").unwrap(),
            "https://ropsten.infura.io/v3/abc"
        );
    }

    #[test]
    fn known_network_requires_credential() {
        let cfg = NetworkConfiguration::known("mainnet").unwrap();
        assert!(matches!(cfg.endpoint("  "), Err(RpcError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(matches!(
            NetworkConfiguration::known("morden"),
            Err(RpcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rpc_network_uses_explicit_values() {
        let cfg = NetworkConfiguration::rpc("http://localhost:8545", "0x539").unwrap();
        assert_eq!(cfg.type_name(), "rpc");
        assert_eq!(cfg.chain_id(), "0x539");
        assert_eq!(cfg.network_id(), None);
        assert_eq!(cfg.endpoint("").unwrap(), "http://localhost:8545");
    }

    #[test]
    fn rpc_network_validation() {
        assert!(NetworkConfiguration::rpc("not a url", "0x1").is_err());
        assert!(NetworkConfiguration::rpc("ws://localhost:8546", "0x1").is_err());
        assert!(NetworkConfiguration::rpc("http://localhost:8545", "1337").is_err());
        assert!(NetworkConfiguration::rpc("http://localhost:8545", "0x").is_err());
        assert!(NetworkConfiguration::rpc("http://localhost:8545", "0xzz").is_err());
    }

    #[test]
    fn deserializes_both_shapes() {
        let known: NetworkConfiguration = serde_json::from_value(json!({"type": "kovan"})).unwrap();
        assert_eq!(known.chain_id(), "0x2a");

        let rpc: NetworkConfiguration = serde_json::from_value(json!({
            "type": "rpc",
            "rpc_url": "https://rpc.example.org",
            "chain_id": "0xA"
        }))
        .unwrap();
        assert_eq!(rpc.chain_id(), "0xa");
        assert_eq!(rpc.rpc_url(), Some("https://rpc.example.org"));

        let missing: Result<NetworkConfiguration, _> =
            serde_json::from_value(json!({"type": "rpc", "rpc_url": "https://rpc.example.org"}));
        assert!(missing.is_err());
    }
}
