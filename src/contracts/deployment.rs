//! Contract deployment with lifecycle tracking.
//!
//! # Responsibilities
//! - Resolve source from a template or caller input
//! - Gate on static security findings before compiling
//! - Compile, encode constructor arguments and submit the creation transaction
//! - Track the deployment until confirmation, then optionally verify it

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::wallet::{SendRequest, WalletService};
use crate::contracts::compiler::{deployment_code, select_deploy_target, Compiler, CompilerSettings};
use crate::contracts::templates::{instantiate, TemplateStore};
use crate::contracts::verifier::{ContractVerifier, VerificationOutcome};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::security::{ContractValidator, SecurityIssue};
use crate::tracking::{confirm_and_record, RecordStore, Tracked, TxRecord};

/// Caller input for a deployment. Exactly one of `source` and `template_id` is used;
/// `source` wins when both are set.
///
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployParams {
    #[serde(default, alias = "template_id")]
    pub template_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Template placeholder values.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default, alias = "constructor_args")]
    pub constructor_args: Vec<Value>,
    #[serde(default)]
    pub verify: bool,
}

/// A submitted deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    #[serde(flatten)]
    pub tx: TxRecord,
    pub contract_name: String,
    pub template_id: Option<String>,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub constructor_args: Vec<Value>,
    /// Set once the creation transaction is confirmed.
    pub contract_address: Option<Address>,
    pub chain_id: u64,
    pub deployer: Address,
    /// Advisory findings that did not block the deployment.
    pub warnings: Vec<SecurityIssue>,
    pub verification: Option<VerificationOutcome>,
}

impl Tracked for DeploymentRecord {
    fn tx(&self) -> &TxRecord {
        &self.tx
    }

    fn tx_mut(&mut self) -> &mut TxRecord {
        &mut self.tx
    }
}

/// Compiles, submits and tracks contract deployments.
pub struct DeploymentAgent {
    chains: Arc<ChainRegistry>,
    templates: Arc<dyn TemplateStore>,
    compiler: Arc<dyn Compiler>,
    verifier: Option<Arc<dyn ContractVerifier>>,
    validator: ContractValidator,
    settings: CompilerSettings,
    records: RecordStore<DeploymentRecord>,
}

impl DeploymentAgent {
    pub fn new(
        chains: Arc<ChainRegistry>,
        templates: Arc<dyn TemplateStore>,
        compiler: Arc<dyn Compiler>,
        validator: ContractValidator,
        settings: CompilerSettings,
        max_records: usize,
    ) -> Self {
        Self {
            chains,
            templates,
            compiler,
            verifier: None,
            validator,
            settings,
            records: RecordStore::new(max_records),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ContractVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn templates(&self) -> &dyn TemplateStore {
        self.templates.as_ref()
    }

    /// Compile and submit a contract, returning its pending record.
    pub async fn deploy_contract(
        &self,
        wallet: Arc<WalletService>,
        params: DeployParams,
    ) -> AgentResult<DeploymentRecord> {
        let deployer = wallet.address()?;
        let chain_id = wallet.chain_id()?;

        let source = self.resolve_source(&params)?;

        let report = self.validator.validate_contract(&source);
        if !report.valid {
            tracing::warn!(findings = %report.summary(), "Deployment blocked by security findings");
            return Err(AgentError::Security(report.high_issues()));
        }

        let output = self.compiler.compile(&source, &self.settings).await?;
        output.ensure_success()?;
        for warning in output.errors.iter().filter(|d| !d.is_error()) {
            tracing::debug!(severity = %warning.severity, message = %warning.message, "Compiler diagnostic");
        }

        let target = select_deploy_target(&source, &output)?;
        let code = deployment_code(target, &params.constructor_args)?;

        let hash = wallet.send_transaction(SendRequest::deploy(code)).await?;

        let record = DeploymentRecord {
            tx: TxRecord::pending(hash),
            contract_name: target.name.clone(),
            template_id: params.template_id.clone(),
            abi: target.abi.clone(),
            bytecode: target.bytecode.clone(),
            constructor_args: params.constructor_args.clone(),
            contract_address: None,
            chain_id,
            deployer,
            warnings: report.issues,
            verification: None,
        };
        self.records.insert(record.clone());
        metrics::record_transaction_submitted("deployment");

        tracing::info!(
            tx_hash = %hash,
            contract = %record.contract_name,
            deployer = %deployer,
            chain_id,
            "Deployment submitted"
        );

        self.spawn_confirmation(wallet, hash, chain_id, params.verify);
        Ok(record)
    }

    fn resolve_source(&self, params: &DeployParams) -> AgentResult<String> {
        if let Some(source) = params.source.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(source.to_string());
        }
        let id = params
            .template_id
            .as_deref()
            .ok_or_else(|| AgentError::Validation("Either source or template_id is required".to_string()))?;
        let template = self
            .templates
            .template(id)
            .ok_or_else(|| AgentError::Validation(format!("Unknown template: {}", id)))?;
        instantiate(&template, &params.parameters)
    }

    fn spawn_confirmation(&self, wallet: Arc<WalletService>, hash: TxHash, chain_id: u64, verify: bool) {
        let store = self.records.clone();
        let confirmations = self.chains.confirmations(chain_id);
        let verifier = if verify { self.verifier.clone() } else { None };

        tokio::spawn(async move {
            let receipt = confirm_and_record(
                wallet,
                store.clone(),
                hash,
                confirmations,
                "deployment",
                |record: &mut DeploymentRecord, receipt| {
                    record.contract_address = receipt.contract_address;
                },
            )
            .await;

            let (Some(verifier), Some(address)) =
                (verifier, receipt.and_then(|r| r.contract_address))
            else {
                return;
            };

            let outcome = match verifier.verify(chain_id, address).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(tx_hash = %hash, contract = %address, error = %e, "Verification failed");
                    VerificationOutcome {
                        verified: false,
                        detail: e.to_string(),
                    }
                }
            };
            store.update(&hash, |record| record.verification = Some(outcome));
        });
    }

    pub fn deployment(&self, hash: &TxHash) -> Option<DeploymentRecord> {
        self.records.get(hash)
    }

    pub fn all_deployments(&self) -> Vec<DeploymentRecord> {
        self.records.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryChainClient;
    use crate::blockchain::signer::{ConnectOptions, ProviderKind};
    use crate::blockchain::types::TxStatus;
    use crate::config::{ChainConfig, SecurityConfig, TransactionConfig};
    use crate::contracts::compiler::{CompiledContract, CompilerDiagnostic, CompilerOutput};
    use crate::contracts::templates::BuiltinTemplates;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one fixed contract and counts invocations.
    #[derive(Default)]
    struct StaticCompiler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Compiler for StaticCompiler {
        async fn compile(&self, _source: &str, _settings: &CompilerSettings) -> AgentResult<CompilerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Ok(CompilerOutput {
                    contracts: vec![],
                    errors: vec![CompilerDiagnostic {
                        message: "TypeError: boom".to_string(),
                        severity: "error".to_string(),
                    }],
                });
            }
            let abi: JsonAbi = serde_json::from_str(
                r#"[{"type":"function","name":"get","inputs":[],"outputs":[],"stateMutability":"view"}]"#,
            )
            .unwrap();
            Ok(CompilerOutput {
                contracts: vec![CompiledContract {
                    name: "SimpleStorage".to_string(),
                    abi,
                    bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]),
                }],
                errors: vec![],
            })
        }
    }

    async fn setup(compiler: Arc<StaticCompiler>) -> (DeploymentAgent, Arc<WalletService>) {
        let mut chains = ChainRegistry::new();
        chains.insert(&ChainConfig::simulated(1, "mainnet"), Arc::new(MemoryChainClient::new(1)));
        let chains = Arc::new(chains);

        let agent = DeploymentAgent::new(
            chains.clone(),
            Arc::new(BuiltinTemplates::new()),
            compiler,
            ContractValidator::new(&SecurityConfig::default()),
            CompilerSettings {
                optimizer_enabled: true,
                optimizer_runs: 200,
                version: "0.8.20".to_string(),
            },
            100,
        );
        let wallet = Arc::new(WalletService::new(
            chains,
            TransactionConfig {
                mock_delay_ms: 5,
                ..Default::default()
            },
        ));
        wallet
            .connect(ProviderKind::Mock, ConnectOptions::default())
            .await
            .unwrap();
        (agent, wallet)
    }

    fn storage_params() -> DeployParams {
        DeployParams {
            template_id: Some("simple-storage".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_security_gate_runs_before_compile() {
        let compiler = Arc::new(StaticCompiler::default());
        let (agent, wallet) = setup(compiler.clone()).await;

        let params = DeployParams {
            source: Some("contract K { function k() public { selfdestruct(payable(msg.sender)); } }".to_string()),
            ..Default::default()
        };
        let err = agent.deploy_contract(wallet, params).await.unwrap_err();
        assert!(matches!(err, AgentError::Security(_)));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compiler_error_aborts() {
        let compiler = Arc::new(StaticCompiler {
            fail: true,
            ..Default::default()
        });
        let (agent, wallet) = setup(compiler).await;
        let err = agent.deploy_contract(wallet.clone(), storage_params()).await.unwrap_err();
        assert!(matches!(err, AgentError::Compilation(_)));
        assert!(wallet.pending_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let (agent, wallet) = setup(Arc::new(StaticCompiler::default())).await;
        let params = DeployParams {
            template_id: Some("missing".to_string()),
            ..Default::default()
        };
        let err = agent.deploy_contract(wallet, params).await.unwrap_err();
        assert!(err.to_string().contains("Unknown template: missing"));
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let (agent, wallet) = setup(Arc::new(StaticCompiler::default())).await;
        wallet.disconnect();
        let err = agent.deploy_contract(wallet, storage_params()).await.unwrap_err();
        assert!(matches!(err, AgentError::NotConnected));
    }

    #[tokio::test]
    async fn test_pending_then_success() {
        let (agent, wallet) = setup(Arc::new(StaticCompiler::default())).await;
        let record = agent.deploy_contract(wallet, storage_params()).await.unwrap();

        assert_eq!(record.tx.status, TxStatus::Pending);
        assert!(record.contract_address.is_none());
        assert_eq!(record.contract_name, "SimpleStorage");

        let mut done = None;
        for _ in 0..200 {
            let current = agent.deployment(&record.tx.hash).unwrap();
            if current.tx.status.is_final() {
                done = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let done = done.expect("deployment never finalized");
        assert_eq!(done.tx.status, TxStatus::Success);
        assert!(done.contract_address.is_some());
        assert!(done.verification.is_none());
        assert_eq!(agent.all_deployments().len(), 1);
    }
}
