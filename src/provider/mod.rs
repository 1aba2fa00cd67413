//! Page-side provider.
//!
//! Posts envelopes tagged for the relay, numbers them, and resolves each
//! caller when the response with its id comes back. Host notifications update
//! the cached wallet config.
//!
//! A request in flight when the port drops is never answered; callers that
//! need a bound wrap [`InpageProvider::request`] in `tokio::time::timeout`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::protocol::method::CONFIG_CHANGED;
use crate::protocol::{Envelope, HostMessage, Method, PageMessage, RequestId, RpcRequest, Target};
use crate::rpc::{JsonRpcResponse, RpcError};
use crate::window::{MessageEvent, Window};

type PendingMap = DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>;

pub struct InpageProvider {
    window: Window,
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    config: watch::Receiver<Option<Value>>,
    listener: JoinHandle<()>,
}

/// Removes the pending slot if the caller stops waiting.
struct PendingSlot<'a> {
    pending: &'a PendingMap,
    id: RequestId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

impl InpageProvider {
    /// Start listening on `window`. Must be called inside a Tokio runtime.
    pub fn attach(window: Window) -> Self {
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let (config_tx, config) = watch::channel(None);

        let events = window.subscribe();
        let listener = tokio::spawn(listen(window.clone(), events, pending.clone(), config_tx));

        Self {
            window,
            next_id: AtomicU64::new(1),
            pending,
            config,
            listener,
        }
    }

    /// Send one request and wait for its response.
    pub async fn request(
        &self,
        method: impl Into<Method>,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id: id.clone(),
        };

        let envelope = Envelope::to_relay(id.clone(), RpcRequest::new(method, params));
        let data = serde_json::to_value(&envelope)
            .map_err(|e| RpcError::internal_error(e.to_string()))?;
        self.window.post_message(data, self.window.origin());

        match rx.await {
            Ok(response) => response.into_result(),
            Err(_) => Err(RpcError::internal_error("provider detached")),
        }
    }

    /// Last wallet config pushed by the host, if any.
    pub fn config(&self) -> Option<Value> {
        self.config.borrow().clone()
    }

    /// Watch for config pushes.
    pub fn config_changes(&self) -> watch::Receiver<Option<Value>> {
        self.config.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for InpageProvider {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    window: Window,
    mut events: broadcast::Receiver<MessageEvent>,
    pending: Arc<PendingMap>,
    config: watch::Sender<Option<Value>>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Provider lagged; responses lost");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if event.origin != window.origin() || event.source != window.id() {
            continue;
        }
        let Ok(message) = serde_json::from_value::<PageMessage>(event.data) else {
            continue;
        };
        if message.target != Target::Inpage {
            continue;
        }

        match message.body {
            HostMessage::Response(response) => match pending.remove(&response.id) {
                Some((_, tx)) => {
                    let _ = tx.send(response);
                }
                None => {
                    tracing::debug!(id = %response.id, "Response for unknown request ignored");
                }
            },
            HostMessage::Notification(notification) if notification.method == CONFIG_CHANGED => {
                config.send_replace(Some(notification.params));
            }
            HostMessage::Notification(notification) => {
                tracing::debug!(method = %notification.method, "Unhandled notification");
            }
        }
    }
}
