//! Routes host output back to the channel a request arrived on.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::host::pending::ChannelId;
use crate::observability::metrics;
use crate::protocol::{HostMessage, Notification};
use crate::rpc::{JsonRpcResponse, REJECTED_MESSAGE};
use crate::transport::PortId;

/// A response frame on the session socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReply {
    pub topic: String,
    pub response: JsonRpcResponse,
}

/// Weak route to a port or session.
///
/// Holding a responder never keeps a channel open: once the port is dropped
/// or the socket closes, sends are discarded.
#[derive(Debug, Clone)]
pub enum Responder {
    Port {
        id: PortId,
        tx: mpsc::WeakUnboundedSender<HostMessage>,
    },
    Session {
        topic: String,
        tx: mpsc::WeakUnboundedSender<SessionReply>,
    },
}

impl Responder {
    pub fn port(id: PortId, tx: &mpsc::UnboundedSender<HostMessage>) -> Self {
        Responder::Port {
            id,
            tx: tx.downgrade(),
        }
    }

    pub fn session(topic: impl Into<String>, tx: &mpsc::UnboundedSender<SessionReply>) -> Self {
        Responder::Session {
            topic: topic.into(),
            tx: tx.downgrade(),
        }
    }

    pub fn channel(&self) -> ChannelId {
        match self {
            Responder::Port { id, .. } => ChannelId::Port(*id),
            Responder::Session { topic, .. } => ChannelId::Session(topic.clone()),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Responder::Port { tx, .. } => tx.upgrade().is_some_and(|tx| !tx.is_closed()),
            Responder::Session { tx, .. } => tx.upgrade().is_some_and(|tx| !tx.is_closed()),
        }
    }

    /// Send the single response for a request. Returns false if dropped.
    pub fn respond(&self, response: JsonRpcResponse) -> bool {
        let outcome = outcome(&response);
        let id = response.id.clone();

        let delivered = match self {
            Responder::Port { tx, .. } => tx
                .upgrade()
                .is_some_and(|tx| tx.send(HostMessage::Response(response)).is_ok()),
            Responder::Session { topic, tx } => tx.upgrade().is_some_and(|tx| {
                tx.send(SessionReply {
                    topic: topic.clone(),
                    response,
                })
                .is_ok()
            }),
        };

        if delivered {
            metrics::record_response(outcome);
        } else {
            tracing::warn!(channel = %self.channel(), id = %id, "Response dropped: channel gone");
            metrics::record_response("dropped");
        }
        delivered
    }

    /// Notifications only travel over ports.
    pub fn notify(&self, notification: Notification) -> bool {
        match self {
            Responder::Port { tx, .. } => tx
                .upgrade()
                .is_some_and(|tx| tx.send(HostMessage::Notification(notification)).is_ok()),
            Responder::Session { .. } => false,
        }
    }
}

fn outcome(response: &JsonRpcResponse) -> &'static str {
    match response.error() {
        None => "success",
        Some(error) if error.code.is_none() && error.message == REJECTED_MESSAGE => "rejected",
        Some(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use serde_json::json;

    #[tokio::test]
    async fn test_port_route() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let responder = Responder::port(PortId::new(), &tx);
        assert!(responder.is_open());
        assert!(responder.respond(JsonRpcResponse::success(RequestId::Number(1), json!(true))));
        assert_eq!(rx.recv().await.unwrap().id(), Some(&RequestId::Number(1)));

        drop(tx);
        assert!(!responder.is_open());
        assert!(!responder.respond(JsonRpcResponse::success(RequestId::Number(2), json!(true))));
    }

    #[tokio::test]
    async fn test_session_route_carries_topic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let responder = Responder::session("topic-1", &tx);
        assert_eq!(responder.channel(), ChannelId::Session("topic-1".into()));
        assert!(!responder.notify(Notification::config_changed(json!({}))));

        responder.respond(JsonRpcResponse::success(RequestId::Number(1), json!("0x1")));
        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.topic, "topic-1");
        assert_eq!(reply.response.result(), Some(&json!("0x1")));
    }
}
