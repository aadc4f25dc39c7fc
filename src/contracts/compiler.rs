//! Solidity compilation boundary.
//!
//! # Responsibilities
//! - Drive `solc --standard-json` as a subprocess
//! - Pick the contract to deploy from a multi-contract source
//! - ABI-encode constructor arguments against the compiled constructor

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{hex, Bytes};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::config::CompilerConfig;
use crate::error::{AgentError, AgentResult};

const SOURCE_UNIT: &str = "Contract.sol";

static CONTRACT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(abstract\s+)?(contract|library|interface)\s+([A-Za-z_]\w*)")
        .unwrap_or_else(|e| panic!("invalid declaration pattern: {}", e))
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub optimizer_enabled: bool,
    pub optimizer_runs: u32,
    pub version: String,
}

impl From<&CompilerConfig> for CompilerSettings {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            optimizer_enabled: config.optimizer_enabled,
            optimizer_runs: config.optimizer_runs,
            version: config.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledContract {
    pub name: String,
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub message: String,
    /// `error`, `warning` or `info`.
    pub severity: String,
}

impl CompilerDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity.eq_ignore_ascii_case("error")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerOutput {
    pub contracts: Vec<CompiledContract>,
    pub errors: Vec<CompilerDiagnostic>,
}

impl CompilerOutput {
    /// Fail with every error diagnostic joined, if there are any.
    pub fn ensure_success(&self) -> AgentResult<()> {
        let errors: Vec<&str> = self
            .errors
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.message.as_str())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Compilation(errors.join("; ")))
        }
    }
}

/// Compiles Solidity source into ABI and bytecode.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source: &str, settings: &CompilerSettings) -> AgentResult<CompilerOutput>;
}

/// `solc` subprocess compiler.
pub struct SolcCompiler {
    solc_path: String,
    detected_version: OnceCell<String>,
}

impl SolcCompiler {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            solc_path: config.solc_path.clone(),
            detected_version: OnceCell::new(),
        }
    }

    /// Version reported by the binary, queried once.
    pub async fn version(&self) -> AgentResult<String> {
        self.detected_version
            .get_or_try_init(|| async {
                let output = Command::new(&self.solc_path)
                    .arg("--version")
                    .output()
                    .await
                    .map_err(|e| {
                        AgentError::Compilation(format!("Failed to run {}: {}", self.solc_path, e))
                    })?;
                let stdout = String::from_utf8_lossy(&output.stdout);
                Ok::<String, AgentError>(
                    stdout
                        .lines()
                        .find_map(|l| l.strip_prefix("Version: "))
                        .unwrap_or("unknown")
                        .trim()
                        .to_string(),
                )
            })
            .await
            .cloned()
    }

    fn standard_input(source: &str, settings: &CompilerSettings) -> Value {
        json!({
            "language": "Solidity",
            "sources": { SOURCE_UNIT: { "content": source } },
            "settings": {
                "optimizer": {
                    "enabled": settings.optimizer_enabled,
                    "runs": settings.optimizer_runs,
                },
                "outputSelection": {
                    "*": { "*": ["abi", "evm.bytecode.object"] }
                }
            }
        })
    }
}

#[derive(Deserialize)]
struct StandardOutput {
    #[serde(default)]
    errors: Vec<StandardError>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, StandardContract>>,
}

#[derive(Deserialize)]
struct StandardError {
    severity: String,
    message: String,
    #[serde(rename = "formattedMessage")]
    formatted_message: Option<String>,
}

#[derive(Deserialize)]
struct StandardContract {
    abi: JsonAbi,
    evm: StandardEvm,
}

#[derive(Deserialize)]
struct StandardEvm {
    bytecode: StandardBytecode,
}

#[derive(Deserialize)]
struct StandardBytecode {
    object: String,
}

#[async_trait]
impl Compiler for SolcCompiler {
    async fn compile(&self, source: &str, settings: &CompilerSettings) -> AgentResult<CompilerOutput> {
        let version = self.version().await?;
        if !version.starts_with(&settings.version) {
            tracing::warn!(
                requested = %settings.version,
                installed = %version,
                "solc version differs from the requested version"
            );
        }

        let input = serde_json::to_vec(&Self::standard_input(source, settings))?;

        let mut child = Command::new(&self.solc_path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Compilation(format!("Failed to run {}: {}", self.solc_path, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| AgentError::Compilation(format!("Failed to write compiler input: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::Compilation(format!("Compiler did not finish: {}", e)))?;
        if !output.status.success() && output.stdout.is_empty() {
            return Err(AgentError::Compilation(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let parsed: StandardOutput = serde_json::from_slice(&output.stdout)?;
        let compiled = parse_standard_output(parsed)?;
        tracing::debug!(
            contracts = compiled.contracts.len(),
            diagnostics = compiled.errors.len(),
            optimizer = settings.optimizer_enabled,
            "Compilation finished"
        );
        Ok(compiled)
    }
}

fn parse_standard_output(parsed: StandardOutput) -> AgentResult<CompilerOutput> {
    let errors = parsed
        .errors
        .into_iter()
        .map(|e| CompilerDiagnostic {
            message: e.formatted_message.unwrap_or(e.message).trim().to_string(),
            severity: e.severity,
        })
        .collect();

    let mut contracts = Vec::new();
    for (name, contract) in parsed.contracts.into_values().flatten() {
        let object = contract.evm.bytecode.object;
        let bytecode = hex::decode(object.trim_start_matches("0x"))
            .map_err(|e| AgentError::Compilation(format!("Invalid bytecode for {}: {}", name, e)))?;
        contracts.push(CompiledContract {
            name,
            abi: contract.abi,
            bytecode: Bytes::from(bytecode),
        });
    }

    Ok(CompilerOutput { contracts, errors })
}

/// Names of deployable contracts, in declaration order.
///
/// Interfaces, libraries and abstract contracts are skipped.
pub fn declared_contracts(source: &str) -> Vec<String> {
    CONTRACT_DECL
        .captures_iter(source)
        .filter(|c| c.get(1).is_none() && &c[2] == "contract")
        .map(|c| c[3].to_string())
        .collect()
}

/// The last declared concrete contract that compiled to non-empty bytecode.
pub fn select_deploy_target<'a>(
    source: &str,
    output: &'a CompilerOutput,
) -> AgentResult<&'a CompiledContract> {
    let deployable = |name: &str| {
        output
            .contracts
            .iter()
            .find(|c| c.name == name && !c.bytecode.is_empty())
    };

    declared_contracts(source)
        .iter()
        .rev()
        .find_map(|name| deployable(name.as_str()))
        .ok_or_else(|| AgentError::Compilation("No deployable contract in source".to_string()))
}

/// ABI-encode `args` against the constructor in `abi`.
///
/// String arguments are coerced to the parameter type; other JSON values are
/// coerced from their JSON text.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[Value]) -> AgentResult<Bytes> {
    let inputs = abi.constructor.as_ref().map(|c| c.inputs.as_slice()).unwrap_or(&[]);
    if inputs.len() != args.len() {
        return Err(AgentError::Validation(format!(
            "Constructor expects {} arguments, got {}",
            inputs.len(),
            args.len()
        )));
    }
    if inputs.is_empty() {
        return Ok(Bytes::new());
    }

    let values = inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param.resolve().map_err(|e| {
                AgentError::Validation(format!("Unsupported constructor type {}: {}", param.ty, e))
            })?;
            let text = match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ty.coerce_str(&text).map_err(|e| {
                AgentError::Validation(format!(
                    "Invalid constructor argument {} ({}): {}",
                    param.name, param.ty, e
                ))
            })
        })
        .collect::<AgentResult<Vec<DynSolValue>>>()?;

    Ok(Bytes::from(DynSolValue::Tuple(values).abi_encode_params()))
}

/// Creation bytecode with encoded constructor arguments appended.
pub fn deployment_code(contract: &CompiledContract, args: &[Value]) -> AgentResult<Bytes> {
    let encoded = encode_constructor_args(&contract.abi, args)?;
    let mut code = Vec::with_capacity(contract.bytecode.len() + encoded.len());
    code.extend_from_slice(&contract.bytecode);
    code.extend_from_slice(&encoded);
    Ok(Bytes::from(code))
}
