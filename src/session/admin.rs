//! Admin REST surface: inspect and resolve pending decisions, manage grants.

use alloy::primitives::Address;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::host::{ChannelId, DecisionPrompt, Grant, HostError, HostStatus, PendingKey};
use crate::protocol::RequestId;
use crate::session::auth::require_api_key;
use crate::session::server::SessionState;

pub fn router(state: SessionState) -> Router<SessionState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/pending", get(get_pending))
        .route("/admin/pending/{channel}/{id}/approve", post(approve))
        .route("/admin/pending/{channel}/{id}/reject", post(reject))
        .route("/admin/pending/{channel}/{id}/dismiss", post(dismiss))
        .route("/admin/permissions", get(get_permissions).post(grant))
        .route("/admin/permissions/revoke", post(revoke))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Errors rendered as `{ "error": "..." }` with a matching status.
#[derive(Debug)]
pub struct AdminError {
    status: StatusCode,
    message: String,
}

impl AdminError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<HostError> for AdminError {
    fn from(err: HostError) -> Self {
        let status = match &err {
            HostError::UnknownRequest(_) => StatusCode::NOT_FOUND,
            HostError::ChannelClosed(_) => StatusCode::GONE,
            HostError::InvalidPayload(_) | HostError::Translate(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    #[serde(flatten)]
    pub host: HostStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct GrantBody {
    pub subject: String,
    pub accounts: Vec<Address>,
    #[serde(default)]
    pub methods: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    pub subject: String,
}

fn pending_key(channel: &str, id: &str) -> Result<PendingKey, AdminError> {
    let channel: ChannelId = channel.parse().map_err(AdminError::bad_request)?;
    Ok(PendingKey {
        channel,
        id: RequestId::from_segment(id),
    })
}

async fn get_status(State(state): State<SessionState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        host: state.host.status(),
    })
}

async fn get_pending(State(state): State<SessionState>) -> Json<Vec<DecisionPrompt>> {
    Json(state.host.pending())
}

async fn approve(
    State(state): State<SessionState>,
    Path((channel, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    let key = pending_key(&channel, &id)?;
    let body: ApproveBody = if body.is_empty() {
        ApproveBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AdminError::bad_request(format!("invalid body: {}", e)))?
    };
    state.host.approve(&key, body.payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reject(
    State(state): State<SessionState>,
    Path((channel, id)): Path<(String, String)>,
) -> Result<StatusCode, AdminError> {
    let key = pending_key(&channel, &id)?;
    state.host.reject(&key)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dismiss(
    State(state): State<SessionState>,
    Path((channel, id)): Path<(String, String)>,
) -> Result<StatusCode, AdminError> {
    let key = pending_key(&channel, &id)?;
    state.host.dismiss(&key)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_permissions(State(state): State<SessionState>) -> Json<Value> {
    Json(json!(state.host.permissions().snapshot()))
}

async fn grant(State(state): State<SessionState>, Json(body): Json<GrantBody>) -> StatusCode {
    let grant = Grant {
        accounts: body.accounts,
        methods: body.methods,
    };
    state.host.permissions().grant(&body.subject, grant);
    StatusCode::NO_CONTENT
}

async fn revoke(State(state): State<SessionState>, Json(body): Json<RevokeBody>) -> StatusCode {
    if state.host.permissions().revoke(&body.subject) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
