//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check chain table integrity (unique ids, usable RPC URLs)
//! - Validate value ranges (timeouts > 0, buffers bounded)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::OrchestratorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chains.is_empty() {
        errors.push(ValidationError::new("chains", "at least one chain is required"));
    }

    let mut seen = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        let field = format!("chains[{}]", i);
        if chain.chain_id == 0 {
            errors.push(ValidationError::new(
                format!("{}.chain_id", field),
                "must be greater than zero",
            ));
        }
        if !seen.insert(chain.chain_id) {
            errors.push(ValidationError::new(
                format!("{}.chain_id", field),
                format!("duplicate chain id {}", chain.chain_id),
            ));
        }
        if chain.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new(
                format!("{}.rpc_timeout_secs", field),
                "must be greater than zero",
            ));
        }
        if !chain.simulated {
            if let Err(e) = chain.rpc_url.parse::<url::Url>() {
                errors.push(ValidationError::new(
                    format!("{}.rpc_url", field),
                    format!("invalid URL '{}': {}", chain.rpc_url, e),
                ));
            }
        }
    }

    if !seen.contains(&config.sessions.default_chain_id) && !config.chains.is_empty() {
        errors.push(ValidationError::new(
            "sessions.default_chain_id",
            format!("chain {} is not configured", config.sessions.default_chain_id),
        ));
    }
    if config.sessions.ttl_secs == 0 {
        errors.push(ValidationError::new("sessions.ttl_secs", "must be greater than zero"));
    }
    if config.sessions.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "sessions.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    let tx = &config.transactions;
    if tx.gas_limit_buffer_percent > 100 {
        errors.push(ValidationError::new(
            "transactions.gas_limit_buffer_percent",
            "must be at most 100",
        ));
    }
    if tx.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "transactions.confirmation_timeout_secs",
            "must be greater than zero",
        ));
    }
    if tx.poll_interval_ms == 0 || tx.max_poll_interval_ms < tx.poll_interval_ms {
        errors.push(ValidationError::new(
            "transactions.poll_interval_ms",
            "must be positive and not exceed max_poll_interval_ms",
        ));
    }
    if tx.max_records == 0 {
        errors.push(ValidationError::new(
            "transactions.max_records",
            "must be greater than zero",
        ));
    }

    if config.security.reentrancy_window_lines == 0 {
        errors.push(ValidationError::new(
            "security.reentrancy_window_lines",
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
