//! Session → wallet bindings with sliding expiry.
//!
//! # Responsibilities
//! - Map external session ids to connected `WalletService` handles
//! - Refresh a session's idle timer on every lookup
//! - Periodically evict idle sessions
//!
//! # Design Decisions
//! - Eviction drops only the binding; confirmation tasks hold their own `Arc`
//! - Without a host signer or private key, connects yield a placeholder mock wallet

use alloy::primitives::{keccak256, Address};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::blockchain::registry::ChainRegistry;
use crate::blockchain::signer::{ConnectOptions, InjectedSigner, ProviderKind};
use crate::blockchain::wallet::WalletService;
use crate::config::{SessionConfig, TransactionConfig};
use crate::error::AgentResult;
use crate::observability::metrics;

/// Session id used when the caller supplies none.
pub const DEFAULT_SESSION_ID: &str = "default";

struct WalletSession {
    wallet: Arc<WalletService>,
    address: Address,
    chain_id: u64,
    last_active_at: Instant,
}

/// Public view of a session binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub address: Address,
    pub chain_id: u64,
    pub provider: Option<ProviderKind>,
}

pub struct SessionManager {
    sessions: DashMap<String, WalletSession>,
    chains: Arc<ChainRegistry>,
    config: SessionConfig,
    tx_config: TransactionConfig,
    host_signer: Option<Arc<dyn InjectedSigner>>,
}

impl SessionManager {
    pub fn new(chains: Arc<ChainRegistry>, config: SessionConfig, tx_config: TransactionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            chains,
            config,
            tx_config,
            host_signer: None,
        }
    }

    /// Run in a browser-capable context: injected connects use `signer`.
    pub fn with_host_signer(mut self, signer: Arc<dyn InjectedSigner>) -> Self {
        self.host_signer = Some(signer);
        self
    }

    /// Collapse missing, empty or blank ids to `DEFAULT_SESSION_ID`.
    pub fn normalize_session_id(session_id: Option<&str>) -> String {
        match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => DEFAULT_SESSION_ID.to_string(),
        }
    }

    /// Wallet bound to the session, refreshing its idle timer.
    pub fn wallet_service(&self, session_id: Option<&str>) -> Option<Arc<WalletService>> {
        self.touch(session_id, |s| Arc::clone(&s.wallet))
    }

    pub fn wallet_address(&self, session_id: Option<&str>) -> Option<Address> {
        self.touch(session_id, |s| s.address)
    }

    pub fn is_wallet_connected(&self, session_id: Option<&str>) -> bool {
        self.touch(session_id, |s| s.wallet.is_connected())
            .unwrap_or(false)
    }

    pub fn session_info(&self, session_id: Option<&str>) -> Option<SessionInfo> {
        let id = Self::normalize_session_id(session_id);
        self.touch(Some(&id), |s| SessionInfo {
            session_id: id.clone(),
            address: s.address,
            chain_id: s.chain_id,
            provider: s.wallet.provider_kind(),
        })
    }

    fn touch<T>(&self, session_id: Option<&str>, read: impl FnOnce(&WalletSession) -> T) -> Option<T> {
        let id = Self::normalize_session_id(session_id);
        self.sessions.get_mut(&id).map(|mut session| {
            session.last_active_at = Instant::now();
            read(&session)
        })
    }

    /// Bind `wallet` to the session, replacing any previous binding.
    pub fn store_connection(
        &self,
        session_id: Option<&str>,
        wallet: Arc<WalletService>,
        address: Address,
        chain_id: Option<u64>,
    ) {
        let id = Self::normalize_session_id(session_id);
        let chain_id = chain_id
            .or_else(|| wallet.chain_id().ok())
            .unwrap_or(self.config.default_chain_id);

        let previous = self.sessions.insert(
            id.clone(),
            WalletSession {
                wallet,
                address,
                chain_id,
                last_active_at: Instant::now(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(session_id = %id, previous = %previous.address, "Session rebound");
        }
        metrics::record_active_sessions(self.sessions.len());
    }

    /// Connect a fresh wallet for the session and bind it.
    ///
    /// A real signer is used when a host signer is configured or a private key
    /// is supplied. Otherwise the session gets a mock wallet whose address is
    /// derived from the session id and provider kind.
    pub async fn connect_wallet(
        &self,
        session_id: Option<&str>,
        kind: ProviderKind,
        mut options: ConnectOptions,
    ) -> AgentResult<SessionInfo> {
        let id = Self::normalize_session_id(session_id);
        if options.chain_id.is_none() {
            options.chain_id = Some(self.config.default_chain_id);
        }
        if options.injected.is_none() {
            options.injected = self.host_signer.clone();
        }

        let wallet = Arc::new(WalletService::new(self.chains.clone(), self.tx_config.clone()));
        let real_signer = match kind {
            ProviderKind::Injected => options.injected.is_some(),
            ProviderKind::PrivateKey => options.private_key.is_some(),
            ProviderKind::Mock => false,
        };

        let address = if real_signer {
            wallet.connect(kind, options).await?
        } else {
            let placeholder = options.address.unwrap_or_else(|| placeholder_address(&id, kind));
            let mock = ConnectOptions {
                chain_id: options.chain_id,
                address: Some(placeholder),
                ..Default::default()
            };
            wallet.connect(ProviderKind::Mock, mock).await?
        };

        let chain_id = wallet.chain_id()?;
        let provider = wallet.provider_kind();
        self.store_connection(Some(&id), wallet, address, Some(chain_id));

        tracing::info!(
            session_id = %id,
            address = %address,
            chain_id,
            requested = %kind,
            simulated = !real_signer,
            "Session wallet connected"
        );

        Ok(SessionInfo {
            session_id: id,
            address,
            chain_id,
            provider,
        })
    }

    /// Disconnect and unbind the session's wallet. Returns `false` if none was bound.
    pub fn disconnect_wallet(&self, session_id: Option<&str>) -> bool {
        let id = Self::normalize_session_id(session_id);
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                session.wallet.disconnect();
                metrics::record_active_sessions(self.sessions.len());
                tracing::info!(session_id = %id, address = %session.address, "Session disconnected");
                true
            }
            None => false,
        }
    }

    /// Evict sessions idle for longer than the TTL. Returns the number evicted.
    pub fn sweep_expired(&self) -> usize {
        let ttl = Duration::from_secs(self.config.ttl_secs);
        let now = Instant::now();
        let before = self.sessions.len();

        self.sessions.retain(|id, session| {
            let keep = now.duration_since(session.last_active_at) <= ttl;
            if !keep {
                tracing::info!(session_id = %id, address = %session.address, "Session expired");
            }
            keep
        });

        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            metrics::record_active_sessions(self.sessions.len());
        }
        evicted
    }

    /// Sweep on a fixed interval until shutdown is signalled.
    pub async fn run_expiry_sweep(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        tracing::info!(
            interval_secs = interval.as_secs(),
            ttl_secs = self.config.ttl_secs,
            "Session sweeper starting"
        );

        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_expired();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Chain used when neither the caller nor the session names one.
    pub fn default_chain_id(&self) -> u64 {
        self.config.default_chain_id
    }
}

/// Deterministic stand-in address for a headless session.
fn placeholder_address(session_id: &str, kind: ProviderKind) -> Address {
    let digest = keccak256(format!("chain-orchestrator:{}:{}", session_id, kind));
    Address::from_slice(&digest[12..])
}
