//! Request translation between signing events and JSON-RPC envelopes.
//!
//! # Data Flow
//! ```text
//! SigningEvent (page envelope | session request)
//!     → translate()  ── unsupported method ──▶ TranslateError (no decision state)
//!     → TranslatedRequest { id, topic?, method, params }
//!     → user decision
//!     → approve() / reject()
//!     → JsonRpcResponse
//! ```
//!
//! # Design Decisions
//! - The allow-list is the closed [`SignerMethod`] type; translation also
//!   excludes the bare `sign` verbs, approval accepts them
//! - Rejection never fails, whatever the method
//! - `topic` is only populated on the session path

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Method, RequestId, RpcRequest, SignerMethod};
use crate::rpc::{ErrorCode, JsonRpcResponse, RpcError};

/// Errors raised while translating a signing event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl From<&TranslateError> for RpcError {
    fn from(err: &TranslateError) -> Self {
        match err {
            TranslateError::UnsupportedMethod(method) => {
                RpcError::method_not_supported().with_data(Value::String(method.clone()))
            }
        }
    }
}

impl From<TranslateError> for RpcError {
    fn from(err: TranslateError) -> Self {
        RpcError::from(&err)
    }
}

/// `params` of a session-based request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub topic: String,
    pub request: RpcRequest,
}

/// A signing event from either entry path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SigningEvent {
    /// `{ id, params: { topic, request: { method, params } } }`
    Session { id: RequestId, params: SessionParams },
    /// `{ id, request: { method, params } }`
    Page { id: RequestId, request: RpcRequest },
}

impl SigningEvent {
    pub fn id(&self) -> &RequestId {
        match self {
            SigningEvent::Session { id, .. } | SigningEvent::Page { id, .. } => id,
        }
    }

    pub fn method(&self) -> &Method {
        match self {
            SigningEvent::Session { params, .. } => &params.request.method,
            SigningEvent::Page { request, .. } => &request.method,
        }
    }
}

/// The normalized request handed to the signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedRequest {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub method: SignerMethod,
    pub params: Vec<Value>,
}

impl TranslatedRequest {
    /// The account this request signs with, when the params name one.
    pub fn account(&self) -> Option<&str> {
        self.method.account(&self.params)
    }

    pub fn approve(&self, payload: Value) -> Result<JsonRpcResponse, TranslateError> {
        approve(self.id.clone(), &Method::Signer(self.method), payload)
    }

    pub fn reject(&self) -> JsonRpcResponse {
        reject(self.id.clone())
    }
}

/// Normalize a signing event. Fails synchronously for anything outside the
/// allow-list.
pub fn translate(event: SigningEvent) -> Result<TranslatedRequest, TranslateError> {
    let (id, topic, request) = match event {
        SigningEvent::Session { id, params } => (id, Some(params.topic), params.request),
        SigningEvent::Page { id, request } => (id, None, request),
    };

    match request.method {
        Method::Signer(method) if method.is_translatable() => Ok(TranslatedRequest {
            id,
            topic,
            method,
            params: request.params,
        }),
        other => Err(TranslateError::UnsupportedMethod(other.as_str().to_string())),
    }
}

/// Wrap a signed payload verbatim as the result for `id`.
pub fn approve(
    id: RequestId,
    method: &Method,
    payload: Value,
) -> Result<JsonRpcResponse, TranslateError> {
    match method {
        Method::Signer(_) => Ok(JsonRpcResponse::success(id, payload)),
        other => Err(TranslateError::UnsupportedMethod(other.as_str().to_string())),
    }
}

/// The universal "user said no" outcome.
pub fn reject(id: RequestId) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, RpcError::rejected())
}

/// Build an error response for `id` from any error value.
pub fn fail(id: RequestId, error: impl Into<RpcError>) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, error.into())
}

/// Build an error response from an unstructured error value.
pub fn fail_with_value(id: RequestId, error: Value) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, RpcError::normalize(error))
}

/// Shorthand used by the host for malformed params.
pub fn invalid_params(id: RequestId, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse::failure(id, RpcError::with_message(ErrorCode::InvalidParams, message))
}
