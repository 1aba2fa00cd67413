//! Relay subsystem (content-script side).
//!
//! # Data Flow
//! ```text
//! page window ── MessageEvent ──▶ guard.rs (origin, source, target tag)
//!     → metadata.rs (title + largest favicon on connection-type methods)
//!     → PortHandle ──▶ privileged host
//!
//! privileged host ── HostMessage ──▶ retag as "wallet-inpage"
//!     → window.post_message(.., captured origin)
//! ```
//!
//! # Design Decisions
//! - The origin is captured once at construction and compared by equality
//! - Guard failures are dropped silently (logged and counted, never answered)
//! - Reconnect uses a fixed delay with no cap; nothing queued while
//!   disconnected is retried
//! - The live port sits behind a swappable handle, replaced wholesale

pub mod forwarder;
pub mod guard;
pub mod metadata;

pub use forwarder::Relay;
pub use guard::{DropReason, OriginGuard};
pub use metadata::{largest_icon, page_metadata};
