//! Single entry point for tagged actions.
//!
//! # Responsibilities
//! - Parse the action tag and its payload
//! - Route to the session manager, agents or token registry
//! - Convert every error into a uniform `ActionResult`
//!
//! # Design Decisions
//! - Each request runs inside an `action` span with a fresh request ID
//! - Wallets are looked up per request; the orchestrator holds no wallet itself

use alloy::primitives::{Address, TxHash};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::blockchain::signer::{ConnectOptions, ProviderKind};
use crate::blockchain::wallet::WalletService;
use crate::contracts::deployment::{DeployParams, DeploymentAgent, DeploymentRecord};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::observability::tracing::{action_span, new_request_id};
use crate::orchestrator::actions::{ActionRequest, ActionResult, ActionType};
use crate::session::SessionManager;
use crate::tokens::registry::TokenRegistry;
use crate::tokens::transfer::{TransferAgent, TransferParams, TransferRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConnectPayload {
    #[serde(default = "default_provider")]
    provider: ProviderKind,
    #[serde(default, alias = "chain_id")]
    chain_id: Option<u64>,
    #[serde(default, alias = "private_key")]
    private_key: Option<String>,
    #[serde(default)]
    address: Option<Address>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Injected
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TokenQuery {
    #[serde(default, alias = "token_address", alias = "address")]
    token_address: Option<String>,
    #[serde(default, alias = "chain_id")]
    chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusQuery {
    #[serde(alias = "txHash", alias = "tx_hash", alias = "transactionHash")]
    hash: TxHash,
}

/// Routes actions to the wallet, deployment and transfer components.
pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    tokens: Arc<TokenRegistry>,
    deployments: DeploymentAgent,
    transfers: TransferAgent,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        tokens: Arc<TokenRegistry>,
        deployments: DeploymentAgent,
        transfers: TransferAgent,
    ) -> Self {
        Self {
            sessions,
            tokens,
            deployments,
            transfers,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    /// Execute one action. Never fails; errors are folded into the result.
    pub async fn handle_action(&self, request: ActionRequest) -> ActionResult {
        let request_id = new_request_id();
        let session_id = SessionManager::normalize_session_id(request.session_id.as_deref());
        let span = action_span(&request_id, &request.action_type, &session_id);

        async move {
            let started = Instant::now();
            let tag = request.action_type;

            let (label, outcome) = match tag.parse::<ActionType>() {
                Ok(action) => (action.as_str(), self.dispatch(action, &session_id, request.payload).await),
                Err(e) => ("UNKNOWN", Err(e)),
            };
            metrics::record_action(label, outcome.is_ok());

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(data) => {
                    tracing::info!(elapsed_ms, "Action completed");
                    ActionResult::ok(tag, data)
                }
                Err(e) => {
                    tracing::warn!(elapsed_ms, error = %e, "Action failed");
                    ActionResult::failed(tag, e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, action: ActionType, session_id: &str, payload: Value) -> AgentResult<Value> {
        match action {
            ActionType::ConnectWallet => {
                let payload: ConnectPayload = parse_payload(payload)?;
                let options = ConnectOptions {
                    chain_id: payload.chain_id,
                    private_key: payload.private_key,
                    address: payload.address,
                    injected: None,
                };
                let info = self
                    .sessions
                    .connect_wallet(Some(session_id), payload.provider, options)
                    .await?;
                Ok(serde_json::to_value(info)?)
            }
            ActionType::DisconnectWallet => {
                let disconnected = self.sessions.disconnect_wallet(Some(session_id));
                Ok(json!({ "disconnected": disconnected }))
            }
            ActionType::DeployContract => {
                let params: DeployParams = parse_payload(payload)?;
                let wallet = self.session_wallet(session_id)?;
                let record = self.deployments.deploy_contract(wallet, params).await?;
                Ok(serde_json::to_value(record)?)
            }
            ActionType::TransferTokens => {
                let params: TransferParams = parse_payload(payload)?;
                let wallet = self.session_wallet(session_id)?;
                let record = self.transfers.transfer_tokens(wallet, params).await?;
                Ok(serde_json::to_value(record)?)
            }
            ActionType::GetTokenInfo => {
                let query: TokenQuery = parse_payload(payload)?;
                let chain_id = query.chain_id.unwrap_or_else(|| self.session_chain(session_id));
                match query.token_address {
                    Some(raw) => {
                        let address = raw.trim().parse::<Address>().map_err(|_| {
                            AgentError::Validation(format!("Invalid token address: {}", raw))
                        })?;
                        let info = self.tokens.resolve(chain_id, address).await?;
                        Ok(serde_json::to_value(info)?)
                    }
                    None => Ok(serde_json::to_value(self.tokens.tokens_for_chain(chain_id))?),
                }
            }
            ActionType::GetContractTemplates => {
                Ok(serde_json::to_value(self.deployments.templates().list())?)
            }
            ActionType::GetDeploymentStatus => {
                let query: StatusQuery = parse_payload(payload)?;
                let record = self.deployments.deployment(&query.hash).ok_or_else(|| {
                    AgentError::Validation(format!("Unknown deployment: {}", query.hash))
                })?;
                Ok(serde_json::to_value(record)?)
            }
            ActionType::GetTransferStatus => {
                let query: StatusQuery = parse_payload(payload)?;
                let record = self.transfers.transfer(&query.hash).ok_or_else(|| {
                    AgentError::Validation(format!("Unknown transfer: {}", query.hash))
                })?;
                Ok(serde_json::to_value(record)?)
            }
        }
    }

    fn session_wallet(&self, session_id: &str) -> AgentResult<Arc<WalletService>> {
        self.sessions
            .wallet_service(Some(session_id))
            .filter(|wallet| wallet.is_connected())
            .ok_or(AgentError::NotConnected)
    }

    fn session_chain(&self, session_id: &str) -> u64 {
        self.sessions
            .session_info(Some(session_id))
            .map(|info| info.chain_id)
            .unwrap_or_else(|| self.sessions.default_chain_id())
    }

    pub fn deployment(&self, hash: &TxHash) -> Option<DeploymentRecord> {
        self.deployments.deployment(hash)
    }

    pub fn transfer(&self, hash: &TxHash) -> Option<TransferRecord> {
        self.transfers.transfer(hash)
    }

    pub fn all_deployments(&self) -> Vec<DeploymentRecord> {
        self.deployments.all_deployments()
    }

    pub fn all_transfers(&self) -> Vec<TransferRecord> {
        self.transfers.all_transfers()
    }
}

/// A missing payload reads as an empty object.
fn parse_payload<T: DeserializeOwned>(payload: Value) -> AgentResult<T> {
    let payload = if payload.is_null() { json!({}) } else { payload };
    serde_json::from_value(payload).map_err(|e| AgentError::Validation(format!("Invalid payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryChainClient;
    use crate::blockchain::registry::ChainRegistry;
    use crate::config::{ChainConfig, CompilerConfig, SecurityConfig, SessionConfig, TransactionConfig};
    use crate::contracts::compiler::{CompilerSettings, SolcCompiler};
    use crate::contracts::templates::BuiltinTemplates;
    use crate::security::ContractValidator;

    fn orchestrator() -> Orchestrator {
        let mut chains = ChainRegistry::new();
        chains.insert(&ChainConfig::simulated(1, "mainnet"), Arc::new(MemoryChainClient::new(1)));
        let chains = Arc::new(chains);
        let tx_config = TransactionConfig {
            mock_delay_ms: 1,
            ..Default::default()
        };
        let validator = ContractValidator::new(&SecurityConfig::default());
        let tokens = Arc::new(TokenRegistry::new(chains.clone()));
        let compiler_config = CompilerConfig::default();

        let deployments = DeploymentAgent::new(
            chains.clone(),
            Arc::new(BuiltinTemplates::new()),
            Arc::new(SolcCompiler::new(&compiler_config)),
            validator.clone(),
            CompilerSettings::from(&compiler_config),
            100,
        );
        let transfers = TransferAgent::new(chains.clone(), tokens.clone(), validator, 100);
        let sessions = Arc::new(SessionManager::new(chains, SessionConfig::default(), tx_config));

        Orchestrator::new(sessions, tokens, deployments, transfers)
    }

    fn request(action: ActionType, payload: Value) -> ActionRequest {
        ActionRequest::new(action, Some("test"), payload)
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_action(ActionRequest {
                action_type: "LAUNCH_ROCKET".to_string(),
                ..Default::default()
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.action_type, "LAUNCH_ROCKET");
        assert!(result.error.unwrap().contains("Unknown action type: LAUNCH_ROCKET"));
    }

    #[tokio::test]
    async fn test_transfer_without_wallet_is_folded() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_action(request(
                ActionType::TransferTokens,
                json!({ "to": "0x000000000000000000000000000000000000dEaD", "amount": "1" }),
            ))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Wallet not connected"));
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_connect_then_disconnect() {
        let orchestrator = orchestrator();
        let connected = orchestrator
            .handle_action(request(ActionType::ConnectWallet, json!({ "provider": "mock" })))
            .await;
        assert!(connected.success, "{:?}", connected.error);
        let data = connected.data.unwrap();
        assert_eq!(data["chainId"], 1);
        assert_eq!(data["sessionId"], "test");

        let disconnected = orchestrator
            .handle_action(request(ActionType::DisconnectWallet, Value::Null))
            .await;
        assert_eq!(disconnected.data.unwrap()["disconnected"], true);
        assert_eq!(orchestrator.sessions().session_count(), 0);
    }

    #[tokio::test]
    async fn test_templates_listed() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_action(request(ActionType::GetContractTemplates, Value::Null))
            .await;
        let ids: Vec<String> = result
            .data
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["erc20-token", "erc721-nft", "simple-storage"]);
    }

    #[tokio::test]
    async fn test_token_info_from_seed() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_action(request(
                ActionType::GetTokenInfo,
                json!({ "tokenAddress": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48" }),
            ))
            .await;
        let data = result.data.unwrap();
        assert_eq!(data["symbol"], "USDC");
        assert_eq!(data["decimals"], 6);
    }

    #[tokio::test]
    async fn test_unknown_status_hash() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_action(request(
                ActionType::GetDeploymentStatus,
                json!({ "hash": TxHash::repeat_byte(0x11) }),
            ))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown deployment"));

        let malformed = orchestrator
            .handle_action(request(ActionType::GetTransferStatus, json!({})))
            .await;
        assert!(malformed.error.unwrap().contains("Invalid payload"));
    }
}
