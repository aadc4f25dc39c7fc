//! Routing and error folding of the action surface.

mod common;

use serde_json::{json, Value};

use chain_orchestrator::{ActionRequest, ActionResult, ActionType};
use common::harness;

#[tokio::test]
async fn test_every_failure_is_a_result() {
    let h = harness();

    let cases = vec![
        ActionRequest {
            action_type: "SELL_EVERYTHING".to_string(),
            ..Default::default()
        },
        ActionRequest::new(ActionType::DeployContract, None, json!({ "template_id": "erc20-token" })),
        ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "ledger" })),
        ActionRequest::new(ActionType::ConnectWallet, None, json!({ "provider": "mock", "chain_id": 56 })),
        ActionRequest::new(ActionType::GetTokenInfo, None, json!({ "token_address": "0x1234" })),
        ActionRequest::new(ActionType::GetDeploymentStatus, None, json!({ "hash": "nope" })),
    ];

    for request in cases {
        let tag = request.action_type.clone();
        let result = h.orchestrator.handle_action(request).await;
        assert!(!result.success, "{} unexpectedly succeeded", tag);
        assert_eq!(result.action_type, tag);
        assert!(result.data.is_none());
        assert!(!result.error.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_unknown_action_message() {
    let h = harness();
    let result = h
        .orchestrator
        .handle_action(ActionRequest {
            action_type: "SELL_EVERYTHING".to_string(),
            ..Default::default()
        })
        .await;
    assert!(result.error.unwrap().contains("Unknown action type: SELL_EVERYTHING"));
}

#[tokio::test]
async fn test_result_wire_shape() {
    let h = harness();
    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::DisconnectWallet, Some("nobody"), Value::Null))
        .await;

    let wire = serde_json::to_value(&result).unwrap();
    assert_eq!(wire["success"], true);
    assert_eq!(wire["actionType"], "DISCONNECT_WALLET");
    assert_eq!(wire["data"]["disconnected"], false);
    assert!(wire.get("error").is_none());

    let parsed: ActionResult = serde_json::from_value(wire).unwrap();
    assert_eq!(parsed, result);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let h = harness();
    for session in ["s1", "s2"] {
        let result = h
            .orchestrator
            .handle_action(ActionRequest::new(ActionType::ConnectWallet, Some(session), json!({ "provider": "mock" })))
            .await;
        assert!(result.success);
    }
    assert_eq!(h.orchestrator.sessions().session_count(), 2);

    let a = h.orchestrator.sessions().wallet_address(Some("s1")).unwrap();
    let b = h.orchestrator.sessions().wallet_address(Some("s2")).unwrap();
    assert_ne!(a, b);

    h.orchestrator
        .handle_action(ActionRequest::new(ActionType::DisconnectWallet, Some("s1"), Value::Null))
        .await;
    assert!(!h.orchestrator.sessions().is_wallet_connected(Some("s1")));
    assert!(h.orchestrator.sessions().is_wallet_connected(Some("s2")));
}

#[tokio::test]
async fn test_token_list_for_session_chain() {
    let h = harness();
    let result = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::GetTokenInfo, None, Value::Null))
        .await;
    let symbols: Vec<String> = result
        .data
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["symbol"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(symbols, vec!["DAI", "USDC", "USDT"]);

    h.orchestrator
        .handle_action(ActionRequest::new(
            ActionType::ConnectWallet,
            None,
            json!({ "provider": "mock", "chain_id": 137 }),
        ))
        .await;
    let polygon = h
        .orchestrator
        .handle_action(ActionRequest::new(ActionType::GetTokenInfo, None, Value::Null))
        .await;
    assert_eq!(polygon.data.unwrap(), json!([]));
}
