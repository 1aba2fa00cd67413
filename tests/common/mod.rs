//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use wallet_bridge::config::{ChainConfig, HostConfig, RelayConfig, WalletConfig};
use wallet_bridge::host::{
    DecisionPrompt, InMemoryPermissions, Signer, SignerError, WalletHost,
};
use wallet_bridge::transport::PortState;
use wallet_bridge::translator::TranslatedRequest;
use wallet_bridge::window::{IconLink, StaticDocument, Window};
use wallet_bridge::{InpageProvider, Relay, Shutdown};

pub const DAPP: &str = "https://dapp.example";
pub const SIGNATURE: &str = "0xDEADBEEF";

pub fn account() -> Address {
    Address::repeat_byte(0x11)
}

/// Signer that returns a fixed payload and counts how often it was asked.
#[derive(Default)]
pub struct StubSigner {
    calls: AtomicUsize,
}

impl StubSigner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Signer for StubSigner {
    fn accounts(&self) -> Vec<Address> {
        vec![account()]
    }

    fn sign<'a>(
        &'a self,
        _request: &'a TranslatedRequest,
        _chain: &'a ChainConfig,
    ) -> BoxFuture<'a, Result<Value, SignerError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(json!(SIGNATURE)) })
    }
}

pub fn document() -> StaticDocument {
    StaticDocument::new("Dapp")
        .with_link(IconLink::new("/favicon-16.png", Some("16x16")))
        .with_link(IconLink::new("/favicon-64.png", Some("64x64")))
}

pub fn two_chains() -> WalletConfig {
    WalletConfig {
        chain_id: 1,
        chains: vec![
            ChainConfig {
                chain_id: 1,
                name: "Ethereum".into(),
                rpc_url: "http://localhost:8545".into(),
            },
            ChainConfig {
                chain_id: 5,
                name: "Goerli".into(),
                rpc_url: "http://localhost:8546".into(),
            },
        ],
    }
}

pub fn spawn_host(config: HostConfig) -> (WalletHost, mpsc::UnboundedReceiver<DecisionPrompt>, Arc<StubSigner>) {
    let signer = Arc::new(StubSigner::default());
    let (host, prompts) = WalletHost::new(
        config,
        two_chains(),
        Arc::new(InMemoryPermissions::new()),
        signer.clone(),
    );
    (host, prompts, signer)
}

/// A page, its relay and its provider wired to one host.
pub struct Bridge {
    pub host: WalletHost,
    pub prompts: mpsc::UnboundedReceiver<DecisionPrompt>,
    pub signer: Arc<StubSigner>,
    pub window: Window,
    pub provider: Arc<InpageProvider>,
    pub state: watch::Receiver<PortState>,
    pub shutdown: Shutdown,
    pub relay: JoinHandle<()>,
}

impl Bridge {
    pub async fn start() -> Self {
        let (host, prompts, signer) = spawn_host(HostConfig::default());
        let window = Window::new(DAPP, Arc::new(document()));

        let relay_config = RelayConfig {
            reconnect_delay_ms: 20,
            ..RelayConfig::default()
        };
        let relay = Relay::new(window.clone(), host.connector(), relay_config);
        let state = relay.state();
        let shutdown = Shutdown::new();
        let relay = tokio::spawn(relay.run(shutdown.subscribe()));

        let provider = Arc::new(InpageProvider::attach(window.clone()));

        let mut bridge = Self {
            host,
            prompts,
            signer,
            window,
            provider,
            state,
            shutdown,
            relay,
        };
        bridge.wait_open().await;
        bridge
    }

    pub async fn wait_open(&mut self) {
        self.state
            .wait_for(|state| *state == PortState::Open)
            .await
            .unwrap();
    }

    pub async fn next_prompt(&mut self) -> DecisionPrompt {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.prompts.recv())
            .await
            .expect("no prompt within 5s")
            .expect("prompt channel closed")
    }

    /// Issue a request on a separate task so the test can act on the prompt.
    pub fn spawn_request(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> JoinHandle<Result<Value, wallet_bridge::rpc::RpcError>> {
        let provider = self.provider.clone();
        tokio::spawn(async move { provider.request(method, params).await })
    }
}
