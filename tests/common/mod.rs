//! Shared fixtures for integration tests.

#![allow(dead_code)]

use alloy::json_abi::JsonAbi;
use alloy::primitives::{keccak256, Bytes, TxHash};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chain_orchestrator::blockchain::{ChainRegistry, MemoryChainClient};
use chain_orchestrator::config::{ChainConfig, OrchestratorConfig};
use chain_orchestrator::contracts::compiler::{CompiledContract, CompilerDiagnostic};
use chain_orchestrator::contracts::{Compiler, CompilerOutput, CompilerSettings, DeploymentRecord};
use chain_orchestrator::lifecycle::assemble;
use chain_orchestrator::tokens::TransferRecord;
use chain_orchestrator::{AgentResult, Orchestrator};

/// Anvil's first account.
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Marker that makes `FakeCompiler` report an error diagnostic.
pub const COMPILE_ERROR: &str = "COMPILE_ERROR";

/// Compiler stand-in that reads contract and function names straight from the source.
#[derive(Default)]
pub struct FakeCompiler {
    calls: AtomicUsize,
}

impl FakeCompiler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, source: &str, _settings: &CompilerSettings) -> AgentResult<CompilerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if source.contains(COMPILE_ERROR) {
            return Ok(CompilerOutput {
                contracts: vec![],
                errors: vec![CompilerDiagnostic {
                    message: "ParserError: Expected ';' but got identifier".to_string(),
                    severity: "error".to_string(),
                }],
            });
        }

        let contract_decl = Regex::new(r"\bcontract\s+(\w+)").unwrap();
        let function_decl = Regex::new(r"\bfunction\s+(\w+)\s*\(").unwrap();

        let functions: Vec<Value> = function_decl
            .captures_iter(source)
            .map(|c| {
                json!({
                    "type": "function",
                    "name": &c[1],
                    "inputs": [],
                    "outputs": [],
                    "stateMutability": "nonpayable"
                })
            })
            .collect();
        let abi: JsonAbi = serde_json::from_value(Value::Array(functions)).unwrap();

        let contracts = contract_decl
            .captures_iter(source)
            .map(|c| {
                let mut bytecode = vec![0x60, 0x80, 0x60, 0x40, 0x52];
                bytecode.extend_from_slice(keccak256(&c[1]).as_slice());
                CompiledContract {
                    name: c[1].to_string(),
                    abi: abi.clone(),
                    bytecode: Bytes::from(bytecode),
                }
            })
            .collect();

        Ok(CompilerOutput {
            contracts,
            errors: vec![],
        })
    }
}

/// Config with short delays so mock confirmations land within a test.
pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig {
        chains: vec![
            ChainConfig::simulated(1, "mainnet"),
            ChainConfig::simulated(137, "polygon"),
        ],
        ..Default::default()
    };
    config.transactions.mock_delay_ms = 5;
    config.transactions.poll_interval_ms = 5;
    config.transactions.max_poll_interval_ms = 20;
    config.transactions.confirmation_timeout_secs = 5;
    config
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub mainnet: Arc<MemoryChainClient>,
    pub compiler: Arc<FakeCompiler>,
}

/// Orchestrator over simulated mainnet and polygon.
pub fn harness() -> Harness {
    harness_with(fast_config())
}

pub fn harness_with(config: OrchestratorConfig) -> Harness {
    let mainnet = Arc::new(MemoryChainClient::new(1));
    let mut chains = ChainRegistry::new();
    chains.insert(&config.chains[0], mainnet.clone());
    for chain in &config.chains[1..] {
        chains.insert(chain, Arc::new(MemoryChainClient::new(chain.chain_id)));
    }

    let compiler = Arc::new(FakeCompiler::default());
    let orchestrator = assemble(&config, Arc::new(chains), compiler.clone());
    Harness {
        orchestrator,
        mainnet,
        compiler,
    }
}

/// Hash field of a record returned in `ActionResult::data`.
pub fn record_hash(data: &Value) -> TxHash {
    serde_json::from_value(data["hash"].clone()).unwrap()
}

pub async fn wait_for_deployment(orchestrator: &Orchestrator, hash: &TxHash) -> DeploymentRecord {
    for _ in 0..400 {
        let record = orchestrator.deployment(hash).unwrap();
        if record.tx.status.is_final() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("deployment {} never finalized", hash);
}

pub async fn wait_for_transfer(orchestrator: &Orchestrator, hash: &TxHash) -> TransferRecord {
    for _ in 0..400 {
        let record = orchestrator.transfer(hash).unwrap();
        if record.tx.status.is_final() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("transfer {} never finalized", hash);
}
