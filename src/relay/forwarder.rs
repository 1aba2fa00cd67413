//! The relay: page channel ↔ transport port forwarder.

use tokio::sync::{broadcast, oneshot, watch};
use tokio::time;

use crate::config::RelayConfig;
use crate::observability::metrics::{self, Direction};
use crate::protocol::{Envelope, HostMessage, Method, PageMessage};
use crate::relay::guard::{DropReason, OriginGuard};
use crate::relay::metadata;
use crate::transport::{
    ConnectInfo, Connector, HealthMonitor, PortHandle, PortLink, PortState,
};
use crate::window::{MessageEvent, Window};

/// Why a port session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Disconnected,
    Shutdown,
}

/// Joins one page window to the privileged host.
///
/// Holds no per-request state: envelopes are forwarded as they arrive and
/// responses are matched to callers by the page, not here.
pub struct Relay<C> {
    window: Window,
    connector: C,
    config: RelayConfig,
    guard: OriginGuard,
    handle: PortHandle,
    state: watch::Sender<PortState>,
}

impl<C: Connector> Relay<C> {
    /// Capture the window origin once; it is never re-read.
    pub fn new(window: Window, connector: C, config: RelayConfig) -> Self {
        let guard = OriginGuard::new(window.origin(), window.id());
        let (state, _) = watch::channel(PortState::Disconnected);
        Self {
            window,
            connector,
            config,
            guard,
            handle: PortHandle::new(),
            state,
        }
    }

    /// Accessor for the live port. Other components resolve the port through
    /// this handle, never through a captured reference.
    pub fn handle(&self) -> PortHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> watch::Receiver<PortState> {
        self.state.subscribe()
    }

    pub fn origin(&self) -> &str {
        self.guard.origin()
    }

    /// Drive the port lifecycle until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut events = self.window.subscribe();

        tracing::info!(
            origin = %self.origin(),
            port_name = %self.config.port_name,
            "Relay starting"
        );

        loop {
            self.state.send_replace(PortState::Connecting);

            let info = ConnectInfo {
                name: self.config.port_name.clone(),
                origin: self.origin().to_string(),
            };
            match self.connector.connect(info) {
                Ok(link) => {
                    if self.serve(link, &mut events, &mut shutdown).await == Exit::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Port connect failed");
                }
            }

            self.state.send_replace(PortState::Disconnected);

            if !self.wait_reconnect(&mut events, &mut shutdown).await {
                break;
            }
            metrics::record_reconnect();
        }

        self.handle.clear();
        self.state.send_replace(PortState::Disconnected);
        tracing::info!(origin = %self.origin(), "Relay stopped");
    }

    async fn serve(
        &self,
        link: PortLink,
        events: &mut broadcast::Receiver<MessageEvent>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Exit {
        let PortLink { port, mut inbound } = link;
        let port_id = port.id();
        self.handle.replace(port);
        self.state.send_replace(PortState::Open);
        tracing::info!(port = %port_id, "Port open");

        // Config is pushed, not polled: ask once before anything else.
        if let Err(e) = self
            .handle
            .post(Envelope::control(Method::GetConfig, self.origin()))
        {
            tracing::warn!(port = %port_id, error = %e, "Config request failed");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = HealthMonitor::new(
            self.handle.clone(),
            self.origin(),
            self.config.health_check_interval(),
        );
        tokio::spawn(monitor.run(stop_rx));

        let exit = loop {
            tokio::select! {
                _ = shutdown.recv() => break Exit::Shutdown,
                message = inbound.recv() => match message {
                    Some(message) => self.handle_host_message(message),
                    None => {
                        tracing::info!(port = %port_id, "Port disconnected");
                        break Exit::Disconnected;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.handle_page_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Page events lagged; messages lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break Exit::Shutdown,
                },
            }
        };

        let _ = stop_tx.send(());
        self.handle.clear();
        exit
    }

    /// Sleep the fixed reconnect delay. Page events arriving meanwhile are
    /// dropped. Returns false on shutdown.
    async fn wait_reconnect(
        &self,
        events: &mut broadcast::Receiver<MessageEvent>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> bool {
        let delay = time::sleep(self.config.reconnect_delay());
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                _ = shutdown.recv() => return false,
                event = events.recv() => {
                    if let Ok(event) = event {
                        if let Ok(envelope) = self.guard.admit(&event) {
                            tracing::debug!(
                                id = ?envelope.id,
                                method = ?envelope.method(),
                                "Dropping page request while disconnected"
                            );
                            metrics::record_dropped("disconnected");
                        }
                    }
                }
            }
        }
    }

    /// Page → host.
    pub fn handle_page_event(&self, event: MessageEvent) {
        let mut envelope = match self.guard.admit(&event) {
            Ok(envelope) => envelope,
            Err(DropReason::OwnEcho) => return,
            Err(reason) => {
                tracing::debug!(
                    reason = reason.as_str(),
                    event_origin = %event.origin,
                    "Page event dropped"
                );
                metrics::record_dropped(reason.as_str());
                return;
            }
        };

        if let Some(request) = envelope.request.as_mut() {
            request.origin = Some(self.origin().to_string());
            if request.method.wants_page_metadata() {
                metadata::enrich(request, self.window.document().as_ref());
            }
        }

        match self.handle.post(envelope) {
            Ok(port) => {
                tracing::trace!(port = %port, "Forwarded page request");
                metrics::record_forwarded(Direction::PageToHost);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Page request dropped");
                metrics::record_dropped("no_port");
            }
        }
    }

    /// Host → page. Always posted to the captured origin.
    pub fn handle_host_message(&self, message: HostMessage) {
        let message = PageMessage::for_page(message);
        match serde_json::to_value(&message) {
            Ok(data) => {
                if self.window.post_message(data, self.origin()) {
                    metrics::record_forwarded(Direction::HostToPage);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode host message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::protocol::{RequestId, Target};
    use crate::rpc::JsonRpcResponse;
    use crate::transport::{pair, HostEnd, TransportError};
    use crate::window::{IconLink, StaticDocument, WindowId};

    const ORIGIN: &str = "https://dapp.example";

    /// Hands every host end to the test and counts attempts.
    struct ScriptedConnector {
        ends: mpsc::UnboundedSender<HostEnd>,
        attempts: Arc<AtomicUsize>,
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, info: ConnectInfo) -> Result<PortLink, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let (link, end) = pair(info);
            self.ends
                .send(end)
                .map_err(|_| TransportError::HostUnavailable("test ended".into()))?;
            Ok(link)
        }
    }

    struct Harness {
        window: Window,
        ends: mpsc::UnboundedReceiver<HostEnd>,
        attempts: Arc<AtomicUsize>,
        state: watch::Receiver<PortState>,
        shutdown: broadcast::Sender<()>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(interval_ms: u64, delay_ms: u64) -> Harness {
        let document = StaticDocument::new("Test Dapp")
            .with_link(IconLink::new("/small.png", Some("16x16")))
            .with_link(IconLink::new("/large.png", Some("128x128")));
        let window = Window::new(ORIGIN, Arc::new(document));

        let (ends_tx, ends) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = ScriptedConnector {
            ends: ends_tx,
            attempts: attempts.clone(),
        };
        let config = RelayConfig {
            reconnect_delay_ms: delay_ms,
            health_check_interval_ms: interval_ms,
            ..RelayConfig::default()
        };

        let relay = Relay::new(window.clone(), connector, config);
        let state = relay.state();
        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(relay.run(rx));

        Harness {
            window,
            ends,
            attempts,
            state,
            shutdown,
            task,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            out.push(envelope);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_request_precedes_health_checks() {
        let mut h = start(100, 1000);
        let mut end = h.ends.recv().await.unwrap();
        assert_eq!(end.info.origin, ORIGIN);
        assert_eq!(end.info.name, "wallet-provider-bridge");

        time::sleep(Duration::from_millis(250)).await;
        let sent = drain(&mut end.inbound);
        let methods: Vec<_> = sent.iter().filter_map(|e| e.method().cloned()).collect();
        assert_eq!(
            methods,
            vec![
                Method::GetConfig,
                Method::HealthCheck,
                Method::HealthCheck,
                Method::HealthCheck
            ]
        );
        assert!(sent.iter().all(|e| e.id.is_none()));
        assert_eq!(*h.state.borrow(), PortState::Open);

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_health_checks_and_reconnects_once_after_delay() {
        let mut h = start(100, 1000);
        let first = h.ends.recv().await.unwrap();
        let HostEnd {
            inbound: mut first_inbound,
            outbound,
            ..
        } = first;

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(drain(&mut first_inbound).len(), 2);

        // Inject the port's own disconnect signal.
        drop(outbound);
        time::sleep(Duration::from_millis(900)).await;

        assert!(drain(&mut first_inbound).is_empty());
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(*h.state.borrow(), PortState::Disconnected);
        assert!(h.ends.try_recv().is_err());

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);

        let mut second = h.ends.recv().await.unwrap();
        let methods: Vec<_> = drain(&mut second.inbound)
            .into_iter()
            .filter_map(|e| e.method().cloned())
            .collect();
        assert_eq!(methods, vec![Method::GetConfig, Method::HealthCheck]);

        time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
        assert_eq!(*h.state.borrow(), PortState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_mismatches_forward_nothing() {
        let mut h = start(60_000, 1000);
        let mut end = h.ends.recv().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
        drain(&mut end.inbound);

        let request = json!({
            "target": "wallet-contentscript",
            "id": 1,
            "request": { "method": "eth_sendTransaction", "params": [{ "from": "0x01" }] }
        });

        h.window.dispatch(MessageEvent {
            origin: "https://evil.example".into(),
            source: h.window.id(),
            data: request.clone(),
        });
        h.window.dispatch(MessageEvent {
            origin: ORIGIN.into(),
            source: WindowId::new(),
            data: request.clone(),
        });
        h.window.post_message(
            json!({ "target": "wallet-inpage", "request": { "method": "eth_accounts" } }),
            ORIGIN,
        );
        time::sleep(Duration::from_millis(10)).await;
        assert!(drain(&mut end.inbound).is_empty());

        h.window.post_message(request, ORIGIN);
        time::sleep(Duration::from_millis(10)).await;
        let forwarded = drain(&mut end.inbound);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].id, Some(RequestId::Number(1)));
        assert_eq!(
            forwarded[0].request.as_ref().unwrap().origin.as_deref(),
            Some(ORIGIN)
        );

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_request_is_enriched() {
        let mut h = start(60_000, 1000);
        let mut end = h.ends.recv().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
        drain(&mut end.inbound);

        h.window.post_message(
            json!({
                "target": "wallet-contentscript",
                "id": 2,
                "request": { "method": "eth_requestAccounts", "params": [] }
            }),
            ORIGIN,
        );
        h.window.post_message(
            json!({
                "target": "wallet-contentscript",
                "id": 3,
                "request": { "method": "eth_chainId", "params": [] }
            }),
            ORIGIN,
        );
        time::sleep(Duration::from_millis(10)).await;

        let forwarded = drain(&mut end.inbound);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(
            forwarded[0].request.as_ref().unwrap().params,
            vec![json!({ "title": "Test Dapp", "icon": "/large.png" })]
        );
        assert!(forwarded[1].request.as_ref().unwrap().params.is_empty());

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_messages_are_retagged_for_page() {
        let mut h = start(60_000, 1000);
        let mut page = h.window.subscribe();
        let end = h.ends.recv().await.unwrap();

        end.outbound
            .send(JsonRpcResponse::success(RequestId::Number(4), json!("0x1")).into())
            .unwrap();
        time::sleep(Duration::from_millis(10)).await;

        let event = page.recv().await.unwrap();
        assert_eq!(event.origin, ORIGIN);
        assert_eq!(event.source, h.window.id());
        let message: PageMessage = serde_json::from_value(event.data).unwrap();
        assert_eq!(message.target, Target::Inpage);
        assert_eq!(message.body.id(), Some(&RequestId::Number(4)));

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_events_dropped_while_disconnected() {
        let mut h = start(60_000, 1000);
        let first = h.ends.recv().await.unwrap();
        drop(first);
        time::sleep(Duration::from_millis(10)).await;

        h.window.post_message(
            json!({
                "target": "wallet-contentscript",
                "id": 9,
                "request": { "method": "eth_accounts", "params": [] }
            }),
            ORIGIN,
        );

        time::sleep(Duration::from_millis(1000)).await;
        let mut second = h.ends.recv().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
        let ids: Vec<_> = drain(&mut second.inbound)
            .into_iter()
            .filter_map(|e| e.id)
            .collect();
        assert!(ids.is_empty());

        h.shutdown.send(()).unwrap();
        h.task.await.unwrap();
    }
}
