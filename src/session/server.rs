//! Session listener: `/session` websocket plus the admin routes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::config::SessionConfig;
use crate::host::{ChannelId, Responder, SessionReply, WalletHost};
use crate::lifecycle::Shutdown;
use crate::protocol::RequestId;
use crate::rpc::{JsonRpcResponse, RpcError};
use crate::session::admin;
use crate::session::claims::{SocketId, TopicClaims};
use crate::translator::SessionParams;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct SessionState {
    pub host: WalletHost,
    pub api_key: Arc<str>,
    pub claims: Arc<TopicClaims>,
}

/// One text frame on the session socket.
#[derive(Debug, Deserialize)]
struct SessionRequest {
    id: RequestId,
    params: SessionParams,
}

pub struct SessionServer {
    state: SessionState,
}

impl SessionServer {
    pub fn new(host: WalletHost, config: &SessionConfig) -> Self {
        Self {
            state: SessionState {
                host,
                api_key: Arc::from(config.api_key.as_str()),
                claims: Arc::new(TopicClaims::new()),
            },
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/session", get(ws_handler))
            .merge(admin::router(self.state.clone()))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Session server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.signaled())
            .await?;

        tracing::info!("Session server stopped");
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SessionState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SessionState) {
    let socket_id = SocketId::new();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SessionReply>();

    let mut writer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            let text = match serde_json::to_string(&reply) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode session reply");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    tracing::debug!(socket = %socket_id, "Session socket opened");

    loop {
        tokio::select! {
            _ = &mut writer => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&state, socket_id, text.as_str(), &tx)
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Session socket error");
                    break;
                }
            },
        }
    }

    // Responders only hold weak senders; decisions made after this are dropped.
    drop(tx);
    writer.abort();
    // Forget parked decisions before the topics can be claimed again.
    for topic in state.claims.owned(socket_id) {
        state.host.drop_pending(&ChannelId::Session(topic));
    }
    let released = state.claims.release(socket_id);
    tracing::debug!(socket = %socket_id, topics = released.len(), "Session socket closed");
}

fn handle_frame(
    state: &SessionState,
    socket_id: SocketId,
    text: &str,
    tx: &mpsc::UnboundedSender<SessionReply>,
) {
    match serde_json::from_str::<SessionRequest>(text) {
        Ok(request) => {
            let responder = Responder::session(request.params.topic.clone(), tx);
            if !state.claims.claim(&request.params.topic, socket_id) {
                tracing::warn!(
                    socket = %socket_id,
                    topic = %request.params.topic,
                    "Topic owned by another socket; request refused"
                );
                responder.respond(JsonRpcResponse::failure(request.id, RpcError::unauthorized()));
                return;
            }
            state.host.handle_session(request.id, request.params, &responder);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed session frame dropped");
        }
    }
}
