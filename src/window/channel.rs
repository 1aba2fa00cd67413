//! Same-process, origin-scoped message channel of one browsing context.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::window::document::PageDocument;

const EVENT_BUFFER: usize = 256;

/// Identity of a window; stands in for `event.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// A delivered `message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub origin: String,
    pub source: WindowId,
    pub data: Value,
}

struct WindowInner {
    id: WindowId,
    origin: String,
    document: Arc<dyn PageDocument>,
    events: broadcast::Sender<MessageEvent>,
}

/// A browsing context: its origin, its document and its message bus.
///
/// Cloning shares the same window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl Window {
    pub fn new(origin: impl Into<String>, document: Arc<dyn PageDocument>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(WindowInner {
                id: WindowId::new(),
                origin: origin.into(),
                document,
                events,
            }),
        }
    }

    pub fn id(&self) -> WindowId {
        self.inner.id
    }

    /// `window.location.origin`.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    pub fn document(&self) -> Arc<dyn PageDocument> {
        self.inner.document.clone()
    }

    /// `window.postMessage(data, targetOrigin)` from this window to itself.
    ///
    /// Returns false when `target_origin` does not match, in which case the
    /// message is silently discarded.
    pub fn post_message(&self, data: Value, target_origin: &str) -> bool {
        if target_origin != "*" && target_origin != self.inner.origin {
            tracing::trace!(target_origin, "postMessage discarded: origin mismatch");
            return false;
        }
        self.dispatch(MessageEvent {
            origin: self.inner.origin.clone(),
            source: self.inner.id,
            data,
        });
        true
    }

    /// Deliver an event as-is, e.g. one posted by another frame.
    pub fn dispatch(&self, event: MessageEvent) {
        // No listeners is not an error.
        let _ = self.inner.events.send(event);
    }

    /// `addEventListener("message", ...)`.
    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.inner.events.subscribe()
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("origin", &self.inner.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::document::StaticDocument;
    use serde_json::json;

    fn window() -> Window {
        Window::new("https://dapp.example", Arc::new(StaticDocument::new("Dapp")))
    }

    #[tokio::test]
    async fn test_post_message_delivers_with_source() {
        let window = window();
        let mut rx = window.subscribe();
        assert!(window.post_message(json!({ "a": 1 }), "https://dapp.example"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.origin, "https://dapp.example");
        assert_eq!(event.source, window.id());
        assert_eq!(event.data, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_post_message_wrong_target_origin() {
        let window = window();
        let mut rx = window.subscribe();
        assert!(!window.post_message(json!(1), "https://evil.example"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_foreign_event() {
        let window = window();
        let mut rx = window.subscribe();
        let stranger = WindowId::new();
        window.dispatch(MessageEvent {
            origin: "https://evil.example".into(),
            source: stranger,
            data: json!(null),
        });
        assert_eq!(rx.recv().await.unwrap().source, stranger);
    }
}
