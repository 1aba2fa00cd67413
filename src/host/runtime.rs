//! The privileged end of every port and session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::config::{ChainConfig, HostConfig, WalletConfig};
use crate::host::pending::{
    ChannelId, DecisionPrompt, PendingEntry, PendingKey, PendingRegistry, PromptKind,
};
use crate::host::permissions::{Grant, PermissionAuthority};
use crate::host::responder::Responder;
use crate::host::signer::Signer;
use crate::observability::metrics;
use crate::protocol::{Envelope, HostMessage, Method, Notification, RequestId};
use crate::rpc::{ErrorCode, JsonRpcResponse, RpcError};
use crate::translator::{self, TranslateError};
use crate::transport::{pair, ConnectInfo, Connector, HostEnd, PortId, PortLink, TransportError};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no pending request {0}")]
    UnknownRequest(PendingKey),

    #[error("channel {0} is closed")]
    ChannelClosed(ChannelId),

    #[error("invalid decision payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

impl From<HostError> for RpcError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::InvalidPayload(message) => {
                RpcError::with_message(ErrorCode::InvalidParams, message)
            }
            HostError::Translate(err) => err.into(),
            other => RpcError::internal_error(other.to_string()),
        }
    }
}

/// Snapshot for the admin status route.
#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub ports: usize,
    pub pending: usize,
    pub chain_id: u64,
    pub connected_subjects: usize,
    pub fresh_origins: Vec<String>,
}

struct PortEntry {
    origin: String,
    /// The only strong sender towards the relay. Removing it disconnects.
    tx: mpsc::UnboundedSender<HostMessage>,
}

struct HostInner {
    config: HostConfig,
    permissions: Arc<dyn PermissionAuthority>,
    signer: Arc<dyn Signer>,
    wallet: ArcSwap<WalletConfig>,
    active_chain: AtomicU64,
    pending: PendingRegistry,
    freshness: DashMap<String, Instant>,
    ports: DashMap<PortId, PortEntry>,
    prompts: mpsc::UnboundedSender<DecisionPrompt>,
}

/// Wallet host. Cloning shares the same host.
#[derive(Clone)]
pub struct WalletHost {
    inner: Arc<HostInner>,
}

impl WalletHost {
    /// Returns the host and the stream of prompts for the UI layer.
    pub fn new(
        config: HostConfig,
        wallet: WalletConfig,
        permissions: Arc<dyn PermissionAuthority>,
        signer: Arc<dyn Signer>,
    ) -> (Self, mpsc::UnboundedReceiver<DecisionPrompt>) {
        let (prompts, prompts_rx) = mpsc::unbounded_channel();
        let active_chain = AtomicU64::new(wallet.chain_id);
        let host = Self {
            inner: Arc::new(HostInner {
                config,
                permissions,
                signer,
                wallet: ArcSwap::from_pointee(wallet),
                active_chain,
                pending: PendingRegistry::default(),
                freshness: DashMap::new(),
                ports: DashMap::new(),
                prompts,
            }),
        };
        (host, prompts_rx)
    }

    /// An in-process connector that attaches ports to this host.
    pub fn connector(&self) -> LocalConnector {
        LocalConnector { host: self.clone() }
    }

    pub fn permissions(&self) -> &Arc<dyn PermissionAuthority> {
        &self.inner.permissions
    }

    // ---- ports ----

    /// Take ownership of the host end of a fresh port and serve it.
    pub fn attach(&self, end: HostEnd) {
        let HostEnd {
            id,
            info,
            inbound,
            outbound,
        } = end;

        let responder = Responder::port(id, &outbound);
        self.inner.ports.insert(
            id,
            PortEntry {
                origin: info.origin.clone(),
                tx: outbound,
            },
        );
        tracing::info!(port = %id, origin = %info.origin, name = %info.name, "Port attached");

        let host = self.clone();
        tokio::spawn(host.serve_port(id, info.origin, inbound, responder));
    }

    async fn serve_port(
        self,
        id: PortId,
        origin: String,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        responder: Responder,
    ) {
        while let Some(envelope) = inbound.recv().await {
            self.handle_envelope(&origin, envelope, &responder);
        }
        self.inner.ports.remove(&id);
        tracing::info!(port = %id, origin = %origin, "Port closed by relay");
        self.drop_pending(&ChannelId::Port(id));
    }

    /// Drop the host side of a port; the relay observes a disconnect.
    pub fn disconnect(&self, port: PortId) -> bool {
        let removed = self.inner.ports.remove(&port).is_some();
        if removed {
            tracing::info!(port = %port, "Port disconnected by host");
            self.drop_pending(&ChannelId::Port(port));
        }
        removed
    }

    /// Forget the decisions parked on a channel that closed. Nothing is sent;
    /// the channel has no one left to answer.
    pub fn drop_pending(&self, channel: &ChannelId) -> usize {
        let dropped = self.inner.pending.drain_channel(channel);
        for key in &dropped {
            tracing::info!(key = %key, "Pending decision dropped: channel closed");
        }
        if !dropped.is_empty() {
            metrics::set_pending(self.inner.pending.len());
        }
        dropped.len()
    }

    pub fn disconnect_all(&self) {
        let ids: Vec<PortId> = self.inner.ports.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.disconnect(id);
        }
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.inner.ports.iter().map(|entry| *entry.key()).collect()
    }

    // ---- freshness ----

    pub(crate) fn record_health_check(&self, origin: &str) {
        self.inner
            .freshness
            .insert(origin.to_string(), Instant::now());
    }

    /// Whether a health check from `origin` arrived within `max_age`.
    pub fn is_fresh(&self, origin: &str, max_age: Duration) -> bool {
        self.inner
            .freshness
            .get(origin)
            .is_some_and(|seen| seen.elapsed() <= max_age)
    }

    /// [`is_fresh`](Self::is_fresh) with the configured window.
    pub fn is_live(&self, origin: &str) -> bool {
        self.is_fresh(origin, self.inner.config.freshness_window())
    }

    // ---- wallet configuration ----

    pub fn wallet_config(&self) -> Arc<WalletConfig> {
        self.inner.wallet.load_full()
    }

    pub fn active_chain(&self) -> u64 {
        self.inner.active_chain.load(Ordering::SeqCst)
    }

    pub(crate) fn active_chain_config(&self) -> Option<ChainConfig> {
        self.inner.wallet.load().chain(self.active_chain()).cloned()
    }

    /// The value pushed to pages as `wallet_configChanged`.
    pub fn config_view(&self) -> Value {
        let wallet = self.inner.wallet.load();
        json!({
            "chainId": format!("0x{:x}", self.active_chain()),
            "chains": wallet
                .chains
                .iter()
                .map(|chain| json!({
                    "chainId": format!("0x{:x}", chain.chain_id),
                    "name": chain.name,
                    "rpcUrl": chain.rpc_url,
                }))
                .collect::<Vec<_>>(),
        })
    }

    /// Swap in a new wallet section and push it to every connected page.
    pub fn update_wallet_config(&self, wallet: WalletConfig) {
        if wallet.chain(self.active_chain()).is_none() {
            self.inner
                .active_chain
                .store(wallet.chain_id, Ordering::SeqCst);
        }
        self.inner.wallet.store(Arc::new(wallet));
        tracing::info!(chain_id = self.active_chain(), "Wallet configuration updated");
        self.broadcast_config();
    }

    pub(crate) fn switch_chain(&self, chain_id: u64) -> bool {
        if self.inner.wallet.load().chain(chain_id).is_none() {
            return false;
        }
        let previous = self.inner.active_chain.swap(chain_id, Ordering::SeqCst);
        if previous != chain_id {
            tracing::info!(from = previous, to = chain_id, "Active chain switched");
            self.broadcast_config();
        }
        true
    }

    pub(crate) fn add_chain(&self, chain: ChainConfig) {
        self.inner.wallet.rcu(|current| {
            let mut next = WalletConfig::clone(current);
            if next.chain(chain.chain_id).is_none() {
                next.chains.push(chain.clone());
            }
            next
        });
        tracing::info!(chain_id = chain.chain_id, name = %chain.name, "Chain added");
        self.broadcast_config();
    }

    fn broadcast_config(&self) {
        let notification = Notification::config_changed(self.config_view());
        for entry in self.inner.ports.iter() {
            if entry
                .tx
                .send(HostMessage::Notification(notification.clone()))
                .is_err()
            {
                tracing::debug!(port = %entry.key(), origin = %entry.origin, "Config push dropped");
            }
        }
    }

    // ---- decisions ----

    /// Park a request and surface the prompt. Returns a response only when
    /// the request could not be parked.
    pub(crate) fn park(
        &self,
        responder: &Responder,
        subject: &str,
        id: RequestId,
        kind: PromptKind,
    ) -> Option<JsonRpcResponse> {
        let key = PendingKey {
            channel: responder.channel(),
            id: id.clone(),
        };
        let prompt = DecisionPrompt {
            key: key.clone(),
            subject: subject.to_string(),
            kind,
        };

        let Some(seq) = self.inner.pending.insert(prompt.clone(), responder.clone()) else {
            tracing::warn!(key = %key, "Duplicate in-flight request id");
            return Some(JsonRpcResponse::failure(
                id,
                RpcError::with_message(ErrorCode::InvalidRequest, "duplicate request id"),
            ));
        };
        metrics::set_pending(self.inner.pending.len());
        tracing::info!(key = %key, subject, "Awaiting user decision");

        if self.inner.prompts.send(prompt).is_err() {
            tracing::warn!(key = %key, "No prompt listener; request stays pending");
        }

        if let Some(timeout) = self.inner.config.decision_timeout() {
            let host = self.clone();
            tokio::spawn(async move {
                time::sleep(timeout).await;
                if let Some(entry) = host.inner.pending.take_if_seq(&key, seq) {
                    tracing::info!(key = %key, "Decision timed out");
                    host.finish_rejected(entry);
                }
            });
        }
        None
    }

    pub fn pending(&self) -> Vec<DecisionPrompt> {
        self.inner.pending.list()
    }

    fn take(&self, key: &PendingKey) -> Result<PendingEntry, HostError> {
        let entry = self
            .inner
            .pending
            .take(key)
            .ok_or_else(|| HostError::UnknownRequest(key.clone()))?;
        metrics::set_pending(self.inner.pending.len());
        Ok(entry)
    }

    fn finish_rejected(&self, entry: PendingEntry) {
        metrics::set_pending(self.inner.pending.len());
        entry
            .responder
            .respond(translator::reject(entry.prompt.key.id.clone()));
    }

    /// Approve a pending request.
    ///
    /// For signing prompts `payload` is the signed result; when absent the
    /// host signer produces it. For connect prompts `payload` may list the
    /// accounts to expose.
    pub async fn approve(&self, key: &PendingKey, payload: Option<Value>) -> Result<(), HostError> {
        let entry = self.take(key)?;
        if !entry.responder.is_open() {
            tracing::warn!(key = %key, "Approval for a closed channel; dropping");
            return Err(HostError::ChannelClosed(key.channel.clone()));
        }

        let id = key.id.clone();
        let subject = entry.prompt.subject.clone();
        let kind = entry.prompt.kind.clone();

        let response = match &kind {
            PromptKind::Sign { request } => match payload {
                Some(payload) => request.approve(payload)?,
                None => self.sign(request).await,
            },
            PromptKind::Connect { method, .. } => {
                let accounts = match payload {
                    Some(value) => match parse_accounts(value) {
                        Ok(accounts) => accounts,
                        Err(e) => {
                            self.inner.pending.restore(entry);
                            metrics::set_pending(self.inner.pending.len());
                            return Err(e);
                        }
                    },
                    None => self.inner.signer.accounts(),
                };
                self.inner
                    .permissions
                    .grant(&subject, Grant::accounts(accounts));
                JsonRpcResponse::success(id, self.connect_result(method, &subject))
            }
            PromptKind::AddChain { chain, .. } => {
                self.add_chain(chain.clone());
                JsonRpcResponse::success(id, Value::Null)
            }
        };

        tracing::info!(key = %key, error = response.is_error(), "Request approved");
        entry.responder.respond(response);
        Ok(())
    }

    async fn sign(&self, request: &translator::TranslatedRequest) -> JsonRpcResponse {
        let Some(chain) = self.active_chain_config() else {
            return translator::fail(
                request.id.clone(),
                RpcError::chain_not_recognized(),
            );
        };
        match self.inner.signer.sign(request, &chain).await {
            Ok(payload) => match request.approve(payload) {
                Ok(response) => response,
                Err(e) => translator::fail(request.id.clone(), e),
            },
            Err(e) => {
                tracing::warn!(id = %request.id, method = %request.method, error = %e, "Signer failed");
                translator::fail(request.id.clone(), e)
            }
        }
    }

    /// The user declined.
    pub fn reject(&self, key: &PendingKey) -> Result<(), HostError> {
        let entry = self.take(key)?;
        tracing::info!(key = %key, "Request rejected");
        self.finish_rejected(entry);
        Ok(())
    }

    /// The prompt was closed without a decision. Resolves as a rejection.
    pub fn dismiss(&self, key: &PendingKey) -> Result<(), HostError> {
        let entry = self.take(key)?;
        tracing::info!(key = %key, "Request dismissed");
        self.finish_rejected(entry);
        Ok(())
    }

    pub(crate) fn connect_result(&self, method: &Method, subject: &str) -> Value {
        let accounts: Vec<String> = self
            .inner
            .permissions
            .accounts(subject)
            .iter()
            .map(Address::to_string)
            .collect();
        match method {
            Method::RequestPermissions => json!([{
                "parentCapability": "eth_accounts",
                "caveats": [{ "type": "restrictReturnedAccounts", "value": accounts }],
            }]),
            _ => json!(accounts),
        }
    }

    pub fn status(&self) -> HostStatus {
        let mut fresh_origins: Vec<String> = self
            .inner
            .freshness
            .iter()
            .filter(|entry| entry.value().elapsed() <= self.inner.config.freshness_window())
            .map(|entry| entry.key().clone())
            .collect();
        fresh_origins.sort();

        HostStatus {
            ports: self.inner.ports.len(),
            pending: self.inner.pending.len(),
            chain_id: self.active_chain(),
            connected_subjects: self.inner.permissions.snapshot().len(),
            fresh_origins,
        }
    }
}

fn parse_accounts(value: Value) -> Result<Vec<Address>, HostError> {
    let value = match value {
        Value::Object(mut map) => map.remove("accounts").unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| HostError::InvalidPayload(format!("expected a list of accounts: {}", e)))
}

/// Connector that attaches each new port to a [`WalletHost`] in this process.
#[derive(Clone)]
pub struct LocalConnector {
    host: WalletHost,
}

impl Connector for LocalConnector {
    fn connect(&self, info: ConnectInfo) -> Result<PortLink, TransportError> {
        let (link, end) = pair(info);
        self.host.attach(end);
        Ok(link)
    }
}
