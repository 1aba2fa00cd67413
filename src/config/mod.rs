//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → relay / host / session server
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → host swaps in the new wallet section
//!     → connected pages receive a config push
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::BridgeConfig;
pub use schema::ChainConfig;
pub use schema::HostConfig;
pub use schema::ObservabilityConfig;
pub use schema::RelayConfig;
pub use schema::SessionConfig;
pub use schema::WalletConfig;
