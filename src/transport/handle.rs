//! Swappable handle to the single live port.
//!
//! The relay owns the handle and replaces its content on every reconnect.
//! Everyone else resolves the current port through it at call time and never
//! keeps the `Arc<Port>` across a reconnection.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::protocol::Envelope;
use crate::transport::port::{Port, PortId, TransportError};

#[derive(Debug, Clone, Default)]
pub struct PortHandle {
    inner: Arc<ArcSwapOption<Port>>,
}

impl PortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the port that is live right now.
    pub fn current(&self) -> Option<Arc<Port>> {
        self.inner.load_full()
    }

    pub fn current_id(&self) -> Option<PortId> {
        (*self.inner.load()).as_ref().map(|port| port.id())
    }

    pub fn is_connected(&self) -> bool {
        (*self.inner.load()).as_ref().is_some_and(|port| !port.is_closed())
    }

    /// Install a new port, returning the one it replaced.
    pub fn replace(&self, port: Port) -> Option<Arc<Port>> {
        self.inner.swap(Some(Arc::new(port)))
    }

    pub fn clear(&self) -> Option<Arc<Port>> {
        self.inner.swap(None)
    }

    /// Post on whichever port is live, returning its id.
    pub fn post(&self, envelope: Envelope) -> Result<PortId, TransportError> {
        let guard = self.inner.load();
        let port = (*guard).as_ref().ok_or(TransportError::NoPort)?;
        port.post(envelope)?;
        Ok(port.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Method;
    use crate::transport::port::{pair, ConnectInfo};

    fn info() -> ConnectInfo {
        ConnectInfo {
            name: "bridge".into(),
            origin: "https://dapp.example".into(),
        }
    }

    #[test]
    fn test_empty_handle() {
        let handle = PortHandle::new();
        assert!(handle.current().is_none());
        assert!(!handle.is_connected());
        assert!(matches!(
            handle.post(Envelope::control(Method::HealthCheck, "x")),
            Err(TransportError::NoPort)
        ));
    }

    #[tokio::test]
    async fn test_replace_routes_to_new_port() {
        let handle = PortHandle::new();
        let clone = handle.clone();

        let (first, mut first_end) = pair(info());
        let first_id = first.port.id();
        handle.replace(first.port);
        assert_eq!(clone.post(Envelope::control(Method::HealthCheck, "x")).unwrap(), first_id);

        let (second, mut second_end) = pair(info());
        let second_id = second.port.id();
        let old = handle.replace(second.port).unwrap();
        assert_eq!(old.id(), first_id);
        drop(old);

        assert_eq!(clone.post(Envelope::control(Method::HealthCheck, "x")).unwrap(), second_id);
        assert!(second_end.inbound.recv().await.is_some());

        // The first port saw exactly one message and is now gone.
        assert!(first_end.inbound.recv().await.is_some());
        assert!(first_end.inbound.recv().await.is_none());
    }

    #[test]
    fn test_clear() {
        let handle = PortHandle::new();
        let (link, _end) = pair(info());
        handle.replace(link.port);
        assert!(handle.is_connected());
        assert!(handle.clear().is_some());
        assert!(handle.current_id().is_none());
    }
}
