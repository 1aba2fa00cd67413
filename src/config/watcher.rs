//! Hot reload of the config file.
//!
//! Only the `[wallet]` section is applied live; it is forwarded to the host,
//! which pushes `wallet_configChanged` to connected pages. Changes to any
//! other section are logged as needing a restart and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{BridgeConfig, WalletConfig};

/// What one reload changed.
#[derive(Debug, Default, PartialEq)]
pub struct ReloadOutcome {
    pub wallet_changed: bool,
    /// Sections that differ but only take effect after a restart.
    pub restart_required: Vec<&'static str>,
}

/// Compare two configs section by section.
pub fn diff_sections(previous: &BridgeConfig, next: &BridgeConfig) -> ReloadOutcome {
    let mut restart_required = Vec::new();
    if previous.relay != next.relay {
        restart_required.push("relay");
    }
    if previous.host != next.host {
        restart_required.push("host");
    }
    if previous.session != next.session {
        restart_required.push("session");
    }
    if previous.observability != next.observability {
        restart_required.push("observability");
    }
    ReloadOutcome {
        wallet_changed: previous.wallet != next.wallet,
        restart_required,
    }
}

/// Watches the config file and forwards wallet sections that changed.
pub struct ConfigWatcher {
    path: PathBuf,
    current: ArcSwap<BridgeConfig>,
    wallet_tx: mpsc::UnboundedSender<WalletConfig>,
}

impl ConfigWatcher {
    /// `initial` is the config the process started with; reloads are diffed
    /// against the last accepted one.
    pub fn new(
        path: &Path,
        initial: BridgeConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<WalletConfig>) {
        let (wallet_tx, wallet_rx) = mpsc::unbounded_channel();
        let watcher = Arc::new(Self {
            path: path.to_path_buf(),
            current: ArcSwap::from_pointee(initial),
            wallet_tx,
        });
        (watcher, wallet_rx)
    }

    /// Re-read the file once. An invalid file leaves the current config in place.
    pub fn reload(&self) -> Result<ReloadOutcome, ConfigError> {
        let next = load_config(&self.path)?;
        let outcome = diff_sections(&self.current.load(), &next);

        if !outcome.restart_required.is_empty() {
            tracing::warn!(
                sections = ?outcome.restart_required,
                "Config sections changed; restart required to apply them"
            );
        }
        if outcome.wallet_changed && self.wallet_tx.send(next.wallet.clone()).is_err() {
            tracing::warn!("Wallet config receiver gone; reload not applied");
        }
        self.current.store(Arc::new(next));
        Ok(outcome)
    }

    /// Start watching in notify's background thread.
    ///
    /// The returned watcher must be kept alive for reloads to keep flowing.
    pub fn run(self: Arc<Self>) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let reloader = self.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match reloader.reload() {
                        Ok(outcome) => tracing::info!(
                            wallet_changed = outcome.wallet_changed,
                            "Config file reloaded"
                        ),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Config reload failed; keeping current configuration"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
