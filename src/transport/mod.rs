//! Transport between the relay and the privileged host.
//!
//! # Data Flow
//! ```text
//! Connector::connect(ConnectInfo)
//!     → PortLink { port, inbound }          (relay side)
//!     → HostEnd { inbound, outbound }       (host side)
//!
//! relay ──PortHandle::post──▶ Port ──▶ host
//! relay ◀──inbound.recv()──── host      (None = disconnected)
//! ```
//!
//! # States
//! ```text
//! Connecting → Open → Disconnected → (fixed delay) → Connecting
//! ```
//!
//! # Design Decisions
//! - Ports are FIFO and best-effort; nothing is replayed across ports
//! - The live port sits behind a swappable handle, never a captured reference
//! - Health checks are advisory and never drive reconnection

pub mod connector;
pub mod handle;
pub mod health;
pub mod port;

use serde::Serialize;

pub use connector::Connector;
pub use handle::PortHandle;
pub use health::HealthMonitor;
pub use port::{pair, ConnectInfo, HostEnd, Port, PortId, PortLink, TransportError};

/// Lifecycle of the relay's port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Connecting,
    Open,
    Disconnected,
}
