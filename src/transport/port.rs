//! A named, bidirectional, ordered channel between relay and host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Envelope, HostMessage};

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host refused or could not accept a new port.
    #[error("host unavailable: {0}")]
    HostUnavailable(String),

    /// The remote end of the port has gone away.
    #[error("{0} is closed")]
    Closed(PortId),

    /// No port is currently open.
    #[error("no live port")]
    NoPort,
}

/// Unique identity of one port instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(Uuid);

impl PortId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

impl FromStr for PortId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("port-").unwrap_or(s);
        Uuid::parse_str(raw).map(Self)
    }
}

/// What the connecting context tells the host about itself.
///
/// In a browser this is filled in by the runtime, not by the page, so the
/// host can trust `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    pub name: String,
    pub origin: String,
}

/// Relay-side sending half of a port.
#[derive(Debug)]
pub struct Port {
    id: PortId,
    name: String,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Port {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue an envelope for the host. Order is preserved per port.
    pub fn post(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.outbound
            .send(envelope)
            .map_err(|_| TransportError::Closed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// What the relay gets back from a successful connect.
///
/// `inbound` yielding `None` is the port's disconnect signal.
#[derive(Debug)]
pub struct PortLink {
    pub port: Port,
    pub inbound: mpsc::UnboundedReceiver<HostMessage>,
}

/// Host-side ends of a port.
#[derive(Debug)]
pub struct HostEnd {
    pub id: PortId,
    pub info: ConnectInfo,
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
    pub outbound: mpsc::UnboundedSender<HostMessage>,
}

/// Create both ends of a fresh port.
pub fn pair(info: ConnectInfo) -> (PortLink, HostEnd) {
    let id = PortId::new();
    let (to_host, from_relay) = mpsc::unbounded_channel();
    let (to_relay, from_host) = mpsc::unbounded_channel();

    let link = PortLink {
        port: Port {
            id,
            name: info.name.clone(),
            outbound: to_host,
        },
        inbound: from_host,
    };
    let end = HostEnd {
        id,
        info,
        inbound: from_relay,
        outbound: to_relay,
    };
    (link, end)
}
