//! Per-action spans.
//!
//! Every orchestrator action runs inside an `action` span carrying a fresh
//! request ID, so events from the wallet and agents can be correlated.

use tracing::Span;
use uuid::Uuid;

pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span for one orchestrator action.
pub fn action_span(request_id: &str, action: &str, session_id: &str) -> Span {
    tracing::info_span!(
        "action",
        request_id = %request_id,
        action = %action,
        session_id = %session_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
