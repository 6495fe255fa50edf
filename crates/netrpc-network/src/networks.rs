//! Built-in network table: name → chain id and gateway host.

/// A network the wallet knows how to reach through the hosted gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownNetwork {
    /// Network name; also answered for `net_version`.
    pub name: &'static str,
    /// Hex chain id answered for `eth_chainId`.
    pub chain_id: &'static str,
    /// Gateway host; the credential completes the URL.
    pub gateway_host: &'static str,
}

impl KnownNetwork {
    /// `https://<host>/v3/<credential>`
    pub fn gateway_url(&self, credential: &str) -> String {
        format!("https://{}/v3/{credential}", self.gateway_host)
    }
}

pub const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        name: "mainnet",
        chain_id: "0x1",
        gateway_host: "mainnet.infura.io",
    },
    KnownNetwork {
        name: "ropsten",
        chain_id: "0x4",
        gateway_host: "ropsten.infura.io",
    },
    KnownNetwork {
        name: "kovan",
        chain_id: "0x2a",
        gateway_host: "kovan.infura.io",
    },
    KnownNetwork {
        name: "goerli",
        chain_id: "0x5",
        gateway_host: "goerli.infura.io",
    },
    KnownNetwork {
        name: "sepolia",
        chain_id: "0xaa36a7",
        gateway_host: "sepolia.infura.io",
    },
];

/// Look up a known network by name (case-sensitive).
pub fn lookup(name: &str) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.name == name)
}
