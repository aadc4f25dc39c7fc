//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the chain registry and every component from configuration
//! - Start background tasks (session sweeper, metrics exporter)
//! - Hand back a `Runtime` that owns the shutdown signal
//!
//! # Design Decisions
//! - Components initialize in dependency order, not concurrently
//! - The metrics exporter is optional and never fatal

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::types::ChainError;
use crate::config::{ConfigError, OrchestratorConfig};
use crate::contracts::{
    BuiltinTemplates, CodePresenceVerifier, Compiler, CompilerSettings, DeploymentAgent,
    SolcCompiler,
};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::security::ContractValidator;
use crate::session::SessionManager;
use crate::tokens::{TokenRegistry, TransferAgent};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Chain setup failed: {0}")]
    Chain(#[from] ChainError),
}

/// Wire every component around an existing chain registry and compiler.
pub fn assemble(
    config: &OrchestratorConfig,
    chains: Arc<ChainRegistry>,
    compiler: Arc<dyn Compiler>,
) -> Orchestrator {
    let validator = ContractValidator::new(&config.security);
    let max_records = config.transactions.max_records;
    let tokens = Arc::new(TokenRegistry::new(chains.clone()));

    let deployments = DeploymentAgent::new(
        chains.clone(),
        Arc::new(BuiltinTemplates::new()),
        compiler,
        validator.clone(),
        CompilerSettings::from(&config.compiler),
        max_records,
    )
    .with_verifier(Arc::new(CodePresenceVerifier::new(chains.clone())));

    let transfers = TransferAgent::new(chains.clone(), tokens.clone(), validator, max_records);

    let sessions = Arc::new(SessionManager::new(
        chains,
        config.sessions.clone(),
        config.transactions.clone(),
    ));

    Orchestrator::new(sessions, tokens, deployments, transfers)
}

/// Build an orchestrator with live chain clients and the `solc` compiler.
pub async fn build_orchestrator(config: &OrchestratorConfig) -> Result<Orchestrator, StartupError> {
    let chains = Arc::new(ChainRegistry::from_config(&config.chains).await?);
    let compiler: Arc<dyn Compiler> = Arc::new(SolcCompiler::new(&config.compiler));
    Ok(assemble(config, chains, compiler))
}

/// A started orchestrator and its background tasks.
pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Signal background tasks and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Background task panicked"),
                Err(_) => tracing::warn!("Background task did not stop before the deadline"),
            }
        }
        tracing::info!("Shutdown complete");
    }
}

/// Start the orchestrator around an already built instance.
pub fn start_with(config: &OrchestratorConfig, orchestrator: Orchestrator) -> Runtime {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Arc::new(orchestrator);
    let shutdown = Shutdown::new();
    let sweeper = tokio::spawn(
        Arc::clone(orchestrator.sessions()).run_expiry_sweep(shutdown.subscribe()),
    );

    tracing::info!(
        chains = config.chains.len(),
        session_ttl_secs = config.sessions.ttl_secs,
        max_records = config.transactions.max_records,
        "Orchestrator started"
    );

    Runtime {
        orchestrator,
        shutdown,
        tasks: vec![sweeper],
    }
}

/// Build from configuration and start background tasks.
pub async fn start(config: &OrchestratorConfig) -> Result<Runtime, StartupError> {
    let orchestrator = build_orchestrator(config).await?;
    Ok(start_with(config, orchestrator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_starts_and_stops() {
        let config = OrchestratorConfig::default();
        let runtime = start(&config).await.unwrap();
        assert_eq!(runtime.orchestrator.sessions().session_count(), 0);
        assert_eq!(runtime.shutdown_handle().receiver_count(), 1);
        runtime.shutdown().await;
    }
}
