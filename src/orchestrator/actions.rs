//! Action envelope types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::AgentError;

/// Actions the orchestrator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ConnectWallet,
    DisconnectWallet,
    DeployContract,
    TransferTokens,
    GetTokenInfo,
    GetContractTemplates,
    GetDeploymentStatus,
    GetTransferStatus,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::ConnectWallet,
        ActionType::DisconnectWallet,
        ActionType::DeployContract,
        ActionType::TransferTokens,
        ActionType::GetTokenInfo,
        ActionType::GetContractTemplates,
        ActionType::GetDeploymentStatus,
        ActionType::GetTransferStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::ConnectWallet => "CONNECT_WALLET",
            ActionType::DisconnectWallet => "DISCONNECT_WALLET",
            ActionType::DeployContract => "DEPLOY_CONTRACT",
            ActionType::TransferTokens => "TRANSFER_TOKENS",
            ActionType::GetTokenInfo => "GET_TOKEN_INFO",
            ActionType::GetContractTemplates => "GET_CONTRACT_TEMPLATES",
            ActionType::GetDeploymentStatus => "GET_DEPLOYMENT_STATUS",
            ActionType::GetTransferStatus => "GET_TRANSFER_STATUS",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AgentError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == tag)
            .ok_or_else(|| AgentError::Validation(format!("Unknown action type: {}", tag)))
    }
}

/// One inbound action.
///
/// `action_type` stays a raw tag so unknown actions still produce a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(alias = "type", alias = "action_type")]
    pub action_type: String,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl ActionRequest {
    pub fn new(action: ActionType, session_id: Option<&str>, payload: Value) -> Self {
        Self {
            action_type: action.as_str().to_string(),
            session_id: session_id.map(str::to_string),
            payload,
        }
    }
}

/// Uniform outcome of an action. Failures carry a message, never an error value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(action_type: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            action_type: action_type.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(action_type: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            action_type: action_type.into(),
            data: None,
            error: Some(error.to_string()),
        }
    }
}
