//! Post-deployment verification.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::registry::ChainRegistry;
use crate::error::{AgentError, AgentResult};

/// Annotation attached to a deployment record after verification ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub verified: bool,
    pub detail: String,
}

/// Checks a freshly deployed contract.
#[async_trait]
pub trait ContractVerifier: Send + Sync {
    async fn verify(&self, chain_id: u64, address: Address) -> AgentResult<VerificationOutcome>;
}

/// Confirms that runtime code exists at the deployed address.
pub struct CodePresenceVerifier {
    chains: Arc<ChainRegistry>,
}

impl CodePresenceVerifier {
    pub fn new(chains: Arc<ChainRegistry>) -> Self {
        Self { chains }
    }
}

#[async_trait]
impl ContractVerifier for CodePresenceVerifier {
    async fn verify(&self, chain_id: u64, address: Address) -> AgentResult<VerificationOutcome> {
        let client = self.chains.client(chain_id)?;
        let code = client.get_code(address).await?;
        if code.is_empty() {
            return Err(AgentError::Transaction(format!("No code at {}", address)));
        }
        Ok(VerificationOutcome {
            verified: true,
            detail: format!("{} bytes of code at {}", code.len(), address),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryChainClient;
    use crate::config::ChainConfig;

    #[tokio::test]
    async fn test_missing_code_fails() {
        let mut chains = ChainRegistry::new();
        chains.insert(&ChainConfig::simulated(1, "mainnet"), Arc::new(MemoryChainClient::new(1)));
        let verifier = CodePresenceVerifier::new(Arc::new(chains));

        let err = verifier.verify(1, Address::repeat_byte(0x01)).await.unwrap_err();
        assert!(err.to_string().contains("No code"));

        let err = verifier.verify(5, Address::repeat_byte(0x01)).await.unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedChain(5)));
    }
}
