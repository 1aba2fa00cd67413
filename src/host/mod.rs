//! Privileged host subsystem.
//!
//! # Data Flow
//! ```text
//! Port (per relay) ─┐
//!                   ├─▶ dispatch.rs
//! Session socket ───┘     ├─ wallet_healthCheck → freshness table
//!                         ├─ wallet_getConfig   → wallet_configChanged push
//!                         ├─ read methods       → immediate response
//!                         ├─ connect / add chain → pending.rs (prompt)
//!                         └─ signer verbs → translator → permissions.rs → pending.rs
//!
//! UI decision (approve / reject / dismiss / timeout)
//!     → runtime.rs resolves the pending entry exactly once
//!     → signer.rs (approve without payload)
//!     → responder.rs routes the response to the originating channel
//! ```
//!
//! # Design Decisions
//! - Permission subject is the origin reported by the port, never the
//!   page-supplied metadata
//! - Responders hold weak senders; a closed channel drops the response
//! - Nothing is queued for the signer until translation and the permission
//!   check both pass

pub mod dispatch;
pub mod pending;
pub mod permissions;
pub mod responder;
pub mod runtime;
pub mod signer;

pub use pending::{ChannelId, DecisionPrompt, PendingKey, PromptKind};
pub use permissions::{Grant, InMemoryPermissions, PermissionAuthority};
pub use responder::{Responder, SessionReply};
pub use runtime::{HostError, HostStatus, LocalConnector, WalletHost};
pub use signer::{LocalSigner, Signer, SignerError};
