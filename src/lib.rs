//! Wallet provider bridge library.
//!
//! Carries JSON-RPC traffic between a page-side provider and a wallet host
//! through an origin-guarded relay, plus a session entry for remote callers.

// Wire format
pub mod protocol;
pub mod rpc;

// Page side
pub mod provider;
pub mod relay;
pub mod transport;
pub mod window;

// Wallet side
pub mod host;
pub mod session;
pub mod translator;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::BridgeConfig;
pub use host::WalletHost;
pub use lifecycle::Shutdown;
pub use provider::InpageProvider;
pub use relay::Relay;
pub use session::SessionServer;
