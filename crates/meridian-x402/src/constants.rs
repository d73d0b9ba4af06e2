use std::time::Duration;

/// x402 scheme name for exact-amount payments on Meridian.
pub const SCHEME_NAME: &str = "exact";

/// Network identifier for the Meridian test network.
pub const TESTNET_NETWORK: &str = "meridian-testnet";

/// Network identifier for the Meridian public network.
pub const MAINNET_NETWORK: &str = "meridian-mainnet";

/// Asset identifier for the network's native unit.
pub const NATIVE_ASSET: &str = "native";

/// The native unit has 7 decimal places; one display unit is 10^7 atomic units.
pub const NATIVE_DECIMALS: u32 = 7;

/// Default REST endpoint of a testnet Meridian node.
pub const TESTNET_RPC_URL: &str = "https://node.testnet.meridian.network";

/// Default REST endpoint of a public-network Meridian node.
pub const MAINNET_RPC_URL: &str = "https://node.meridian.network";

/// Default retention for settlement records in the replay store (30 days).
pub const REPLAY_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default upper bound for a single ledger network call.
pub const LEDGER_TIMEOUT_SECS: u64 = 10;

/// Runtime network configuration. Decouples verification and settlement from
/// compile-time constants so a single build can serve either network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: String,
    pub scheme_name: String,
    pub native_decimals: u32,
    pub rpc_url: String,
    /// Upper bound applied to every ledger network call.
    pub ledger_timeout: Duration,
}

impl Default for NetworkConfig {
    /// Defaults to the Meridian test network.
    fn default() -> Self {
        Self {
            network: TESTNET_NETWORK.to_string(),
            scheme_name: SCHEME_NAME.to_string(),
            native_decimals: NATIVE_DECIMALS,
            rpc_url: TESTNET_RPC_URL.to_string(),
            ledger_timeout: Duration::from_secs(LEDGER_TIMEOUT_SECS),
        }
    }
}

impl NetworkConfig {
    /// Configuration for the public network.
    pub fn mainnet() -> Self {
        Self {
            network: MAINNET_NETWORK.to_string(),
            rpc_url: MAINNET_RPC_URL.to_string(),
            ..Self::default()
        }
    }

    /// Whether (scheme, network) is a declared supported combination.
    pub fn supports(&self, scheme: &str, network: &str) -> bool {
        scheme == self.scheme_name && network == self.network
    }
}
