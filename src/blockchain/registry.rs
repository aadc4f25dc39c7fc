//! Process-wide table of chain clients keyed by chain ID.

use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::client::{ChainClient, RpcChainClient};
use crate::blockchain::memory::MemoryChainClient;
use crate::blockchain::types::ChainResult;
use crate::config::ChainConfig;
use crate::error::{AgentError, AgentResult};

/// A configured network.
#[derive(Clone)]
pub struct ChainEntry {
    pub name: String,
    pub confirmation_blocks: u64,
    pub simulated: bool,
    pub client: Arc<dyn ChainClient>,
}

/// Read-mostly lookup of chain clients, shared across sessions and agents.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainEntry>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every configured chain.
    pub async fn from_config(chains: &[ChainConfig]) -> ChainResult<Self> {
        let mut registry = Self::new();
        for chain in chains {
            let client: Arc<dyn ChainClient> = if chain.simulated {
                Arc::new(MemoryChainClient::new(chain.chain_id))
            } else {
                Arc::new(RpcChainClient::new(chain.clone()).await?)
            };
            registry.insert(chain, client);
        }
        tracing::info!(chains = registry.chains.len(), "Chain registry ready");
        Ok(registry)
    }

    /// Register `client` under the settings in `chain`.
    pub fn insert(&mut self, chain: &ChainConfig, client: Arc<dyn ChainClient>) {
        self.chains.insert(
            chain.chain_id,
            ChainEntry {
                name: chain.name.clone(),
                confirmation_blocks: chain.confirmation_blocks.max(1),
                simulated: chain.simulated,
                client,
            },
        );
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn entry(&self, chain_id: u64) -> Option<&ChainEntry> {
        self.chains.get(&chain_id)
    }

    /// Client for `chain_id`, or `UnsupportedChain`.
    pub fn client(&self, chain_id: u64) -> AgentResult<Arc<dyn ChainClient>> {
        self.chains
            .get(&chain_id)
            .map(|entry| entry.client.clone())
            .ok_or(AgentError::UnsupportedChain(chain_id))
    }

    /// Confirmation depth required on `chain_id`; one when unknown.
    pub fn confirmations(&self, chain_id: u64) -> u64 {
        self.chains
            .get(&chain_id)
            .map(|entry| entry.confirmation_blocks)
            .unwrap_or(1)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chain_ids", &self.chain_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;

    #[tokio::test]
    async fn test_default_config_builds_simulated_chains() {
        let config = OrchestratorConfig::default();
        let registry = ChainRegistry::from_config(&config.chains).await.unwrap();

        assert_eq!(registry.chain_ids(), vec![1, 10, 137, 42161, 11155111]);
        assert!(registry.entry(1).unwrap().simulated);
        assert_eq!(registry.client(137).unwrap().chain_id(), 137);
    }

    #[test]
    fn test_unknown_chain_is_unsupported() {
        let registry = ChainRegistry::new();
        let err = registry.client(56).err().unwrap();
        assert!(matches!(err, AgentError::UnsupportedChain(56)));
        assert_eq!(registry.confirmations(56), 1);
    }
}
