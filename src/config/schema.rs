//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Networks the orchestrator can reach.
    pub chains: Vec<ChainConfig>,

    /// Wallet session settings.
    pub sessions: SessionConfig,

    /// Transaction submission and confirmation settings.
    pub transactions: TransactionConfig,

    /// Static analysis thresholds.
    pub security: SecurityConfig,

    /// Solidity compiler settings.
    pub compiler: CompilerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            sessions: SessionConfig::default(),
            transactions: TransactionConfig::default(),
            security: SecurityConfig::default(),
            compiler: CompilerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Per-chain client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Chain ID (e.g., 1 for Ethereum mainnet, 11155111 for Sepolia).
    pub chain_id: u64,

    /// Human-readable network name.
    pub name: String,

    /// JSON-RPC endpoint URL.
    #[serde(default)]
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    #[serde(default = "default_confirmations")]
    pub confirmation_blocks: u64,

    /// Maximum fee per gas in gwei (protection against spikes).
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: u64,

    /// Use the in-memory simulated chain instead of a live RPC endpoint.
    #[serde(default)]
    pub simulated: bool,
}

fn default_rpc_timeout() -> u64 {
    10
}

fn default_confirmations() -> u64 {
    1
}

fn default_max_gas_price() -> u64 {
    500
}

impl ChainConfig {
    /// A simulated chain entry with default limits.
    pub fn simulated(chain_id: u64, name: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            rpc_url: String::new(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: default_rpc_timeout(),
            confirmation_blocks: default_confirmations(),
            max_gas_price_gwei: default_max_gas_price(),
            simulated: true,
        }
    }

    fn reference(chain_id: u64, name: &str, rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            ..Self::simulated(chain_id, name)
        }
    }
}

/// The reference networks. All start simulated so a fresh install never
/// touches a live node until an operator opts in.
fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig::reference(1, "mainnet", "https://ethereum-rpc.publicnode.com"),
        ChainConfig::reference(
            11155111,
            "sepolia",
            "https://ethereum-sepolia-rpc.publicnode.com",
        ),
        ChainConfig::reference(42161, "arbitrum", "https://arb1.arbitrum.io/rpc"),
        ChainConfig::reference(10, "optimism", "https://mainnet.optimism.io"),
        ChainConfig::reference(137, "polygon", "https://polygon-rpc.com"),
    ]
}

/// Wallet session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted.
    pub ttl_secs: u64,

    /// How often the expiry sweep runs.
    pub sweep_interval_secs: u64,

    /// Chain used when a connect request names none.
    pub default_chain_id: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            default_chain_id: 1,
        }
    }
}

/// Transaction submission and confirmation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Buffer added to every estimated gas limit, in percent.
    pub gas_limit_buffer_percent: u64,

    /// Maximum time a confirmation wait may take.
    pub confirmation_timeout_secs: u64,

    /// Initial receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Upper bound for the backed-off polling interval in milliseconds.
    pub max_poll_interval_ms: u64,

    /// Simulated latency for mock wallets in milliseconds.
    pub mock_delay_ms: u64,

    /// Maximum records each agent retains.
    pub max_records: usize,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas_limit_buffer_percent: 20,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 2000,
            max_poll_interval_ms: 15_000,
            mock_delay_ms: 1500,
            max_records: 10_000,
        }
    }
}

/// Static analysis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Native value (in whole ether) above which a transfer is flagged.
    pub large_transfer_threshold_eth: u64,

    /// Lines after an external call searched for state writes.
    pub reentrancy_window_lines: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            large_transfer_threshold_eth: 100,
            reentrancy_window_lines: 5,
        }
    }
}

/// Solidity compiler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Path to the `solc` binary.
    pub solc_path: String,

    /// Requested compiler version.
    pub version: String,

    /// Enable the optimizer.
    pub optimizer_enabled: bool,

    /// Optimizer runs.
    pub optimizer_runs: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solc_path: "solc".to_string(),
            version: "0.8.20".to_string(),
            optimizer_enabled: true,
            optimizer_runs: 200,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        let ids: Vec<u64> = config.chains.iter().map(|c| c.chain_id).collect();
        assert_eq!(ids, vec![1, 11155111, 42161, 10, 137]);
        assert!(config.chains.iter().all(|c| c.simulated));
        assert_eq!(config.sessions.ttl_secs, 1800);
        assert_eq!(config.transactions.gas_limit_buffer_percent, 20);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [[chains]]
            chain_id = 31337
            name = "anvil"
            rpc_url = "http://localhost:8545"

            [sessions]
            ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chains[0].confirmation_blocks, 1);
        assert!(!config.chains[0].simulated);
        assert_eq!(config.sessions.ttl_secs, 60);
        assert_eq!(config.sessions.default_chain_id, 1);
        assert_eq!(config.compiler.optimizer_runs, 200);
    }
}
