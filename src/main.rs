//! Wallet provider bridge host.
//!
//! # Architecture Overview
//!
//! ```text
//!   page ──window──▶ InpageProvider
//!                         │ postMessage (target: wallet-contentscript)
//!                         ▼
//!                       Relay ── origin guard, metadata, health checks
//!                         │ port "wallet-provider-bridge"
//!                         ▼
//!                    WalletHost ◀── /session websocket (remote callers)
//!                         │
//!               pending decisions ── /admin REST (approve / reject)
//!                         │
//!                       Signer
//! ```
//!
//! This binary runs the host side: the wallet host, its session listener and
//! the admin surface. Pages attach in-process through `WalletHost::connector`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use wallet_bridge::config::loader::load_config;
use wallet_bridge::config::watcher::ConfigWatcher;
use wallet_bridge::config::BridgeConfig;
use wallet_bridge::host::{InMemoryPermissions, LocalSigner, WalletHost};
use wallet_bridge::lifecycle::signals::wait_for_signal;
use wallet_bridge::observability::{logging, metrics};
use wallet_bridge::{SessionServer, Shutdown};

#[derive(Parser)]
#[command(name = "wallet-bridge")]
#[command(about = "Wallet provider bridge host", long_about = None)]
struct Cli {
    /// Path to the TOML config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("wallet-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        chain_id = config.wallet.chain_id,
        chains = config.wallet.chains.len(),
        session_enabled = config.session.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let signer = Arc::new(LocalSigner::from_env()?);
    let permissions = Arc::new(InMemoryPermissions::new());
    let (host, mut prompts) = WalletHost::new(
        config.host.clone(),
        config.wallet.clone(),
        permissions,
        signer,
    );

    // Prompts are resolved over the admin surface; surface them in the log.
    tokio::spawn(async move {
        while let Some(prompt) = prompts.recv().await {
            match serde_json::to_string(&prompt) {
                Ok(json) => tracing::info!(key = %prompt.key, prompt = %json, "Decision pending"),
                Err(e) => tracing::warn!(error = %e, "Failed to encode prompt"),
            }
        }
    });

    // Hot reload of the wallet section
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut wallets) = ConfigWatcher::new(path, config.clone());
            let watch_handle = watcher.run()?;
            let host = host.clone();
            tokio::spawn(async move {
                while let Some(wallet) = wallets.recv().await {
                    host.update_wallet_config(wallet);
                }
            });
            Some(watch_handle)
        }
        None => None,
    };

    let shutdown = Shutdown::new();

    let server = if config.session.enabled {
        let listener = TcpListener::bind(&config.session.bind_address).await?;
        let server = SessionServer::new(host.clone(), &config.session);
        Some(tokio::spawn(server.run(listener, shutdown.clone())))
    } else {
        None
    };

    wait_for_signal(shutdown.clone()).await;
    host.disconnect_all();

    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Session server failed"),
            Err(e) => tracing::error!(error = %e, "Session server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
