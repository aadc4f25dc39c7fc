//! Contract deployment through the orchestrator surface.

mod common;

use serde_json::json;
use std::time::Duration;

use chain_orchestrator::blockchain::TxStatus;
use chain_orchestrator::{ActionRequest, ActionType};
use common::{harness, record_hash, wait_for_deployment, COMPILE_ERROR, TEST_PRIVATE_KEY};

const OWNER: &str = "0x000000000000000000000000000000000000aBc1";

fn erc20_payload() -> serde_json::Value {
    json!({
        "templateId": "erc20-token",
        "parameters": {
            "name": "T",
            "symbol": "T",
            "initialSupply": "100",
            "owner": OWNER
        }
    })
}

#[tokio::test]
async fn test_erc20_template_end_to_end() {
    let h = harness();
    let connected = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::ConnectWallet, Some("alice"), json!({ "provider": "mock" })))
        .await;
    assert!(connected.success, "{:?}", connected.error);

    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::DeployContract, Some("alice"), erc20_payload()))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.action_type, "DEPLOY_CONTRACT");

    let data = result.data.unwrap();
    assert_eq!(data["status"], "pending");
    assert!(data["contractAddress"].is_null());
    assert_eq!(data["contractName"], "Token");
    assert_ne!(data["bytecode"], "0x");
    let has_mint = data["abi"]
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["name"] == "mint");
    assert!(has_mint, "abi without mint: {}", data["abi"]);

    let hash = record_hash(&data);
    let done = wait_for_deployment(&h.orchestrator, &hash).await;
    assert_eq!(done.tx.status, TxStatus::Success);
    assert!(done.contract_address.is_some());
    assert_eq!(h.compiler.calls(), 1);

    let status = h
        .orchestrator
        .handle_action(ActionRequest::new(
            ActionType::GetDeploymentStatus,
            Some("alice"),
            json!({ "hash": hash }),
        ))
        .await;
    assert_eq!(status.data.unwrap()["status"], "success");
}

#[tokio::test]
async fn test_keyed_deployment_is_verified_on_chain() {
    let h = harness();
    let connected = h
        .orchestrator
        .handle_action(ActionRequest::new(
            ActionType::ConnectWallet,
            None,
            json!({ "provider": "private_key", "private_key": TEST_PRIVATE_KEY }),
        ))
        .await;
    assert!(connected.success, "{:?}", connected.error);

    let mut payload = erc20_payload();
    payload["verify"] = json!(true);
    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::DeployContract, None, payload))
        .await;
    let hash = record_hash(&result.data.unwrap());
    assert!(h.mainnet.sent_transaction(&hash).unwrap().to.is_none());

    let done = wait_for_deployment(&h.orchestrator, &hash).await;
    assert_eq!(done.tx.status, TxStatus::Success);

    let mut verification = None;
    for _ in 0..200 {
        verification = h.orchestrator.deployment(&hash).unwrap().verification;
        if verification.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let verification = verification.expect("verification never recorded");
    assert!(verification.verified, "{}", verification.detail);
}

#[tokio::test]
async fn test_selfdestruct_source_is_blocked_before_compile() {
    let h = harness();
    h.orchestrator
        .handle_action(ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "mock" })))
        .await;

    let source = r#"
        pragma solidity ^0.8.20;
        contract Bomb {
            function boom() public {
                selfdestruct(payable(msg.sender));
            }
        }
    "#;
    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::DeployContract, None, json!({ "source": source })))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Self-destruct"));
    assert_eq!(h.compiler.calls(), 0);
    assert!(h.orchestrator.all_deployments().is_empty());
}

#[tokio::test]
async fn test_compile_error_is_reported() {
    let h = harness();
    h.orchestrator
        .handle_action(ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "mock" })))
        .await;

    let source = format!("contract Broken {{ {} }}", COMPILE_ERROR);
    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::DeployContract, None, json!({ "source": source })))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Compilation failed"));
    assert!(h.orchestrator.all_deployments().is_empty());
}

#[tokio::test]
async fn test_template_parameters_are_checked() {
    let h = harness();
    h.orchestrator
        .handle_action(ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "mock" })))
        .await;

    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(
            ActionType::DeployContract,
            None,
            json!({
                "template_id": "erc20-token",
                "parameters": { "name": "T", "symbol": "T", "owner": "0xabc" }
            }),
        ))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("owner"));
    assert_eq!(h.compiler.calls(), 0);
}

#[tokio::test]
async fn test_unknown_deploy_field_is_rejected() {
    let h = harness();
    h.orchestrator
        .handle_action(ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "mock" })))
        .await;

    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(
            ActionType::DeployContract,
            None,
            json!({ "templateID": "erc20-token", "parameters": {} }),
        ))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Invalid payload"));
    assert_eq!(h.compiler.calls(), 0);
}
