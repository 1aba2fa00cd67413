//! Establishing ports.

use crate::transport::port::{ConnectInfo, PortLink, TransportError};

/// Opens a new port to the privileged host.
///
/// Each call yields a brand-new port; a half-open port is never repaired.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, info: ConnectInfo) -> Result<PortLink, TransportError>;
}

impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    fn connect(&self, info: ConnectInfo) -> Result<PortLink, TransportError> {
        (**self).connect(info)
    }
}
