//! JSON-RPC error objects sent to the page.
//!
//! Every failure that crosses the wire is normalized into [`RpcError`] first,
//! so the page always sees `{ code?, message, data? }`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used for every user-declined outcome.
pub const REJECTED_MESSAGE: &str = "JSONRPC_REQUEST_METHOD_REJECTED";

/// A JSON-RPC error payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const fn new(code: ErrorCode) -> Self {
        Self {
            code: Some(code.code()),
            message: Cow::Borrowed(code.message()),
            data: None,
        }
    }

    /// The user declined, dismissed, or let the prompt time out.
    ///
    /// Carries no code: the page contract is the message alone.
    pub const fn rejected() -> Self {
        Self {
            code: None,
            message: Cow::Borrowed(REJECTED_MESSAGE),
            data: None,
        }
    }

    pub const fn method_not_supported() -> Self {
        Self::new(ErrorCode::MethodNotSupported)
    }

    pub const fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub const fn chain_not_recognized() -> Self {
        Self::new(ErrorCode::ChainNotRecognized)
    }

    pub fn invalid_params<M: Into<String>>(message: M) -> Self {
        Self::with_message(ErrorCode::InvalidParams, message)
    }

    pub fn internal_error<M: Into<String>>(message: M) -> Self {
        Self::with_message(ErrorCode::InternalError, message)
    }

    pub fn with_message<M: Into<String>>(code: ErrorCode, message: M) -> Self {
        Self {
            code: Some(code.code()),
            message: Cow::Owned(message.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Coerce an arbitrary error value into `{ code, message }`.
    ///
    /// - an object with a string `message` keeps its `code` (or gets the
    ///   internal code) and any `data`
    /// - a bare string becomes the message of an internal error
    /// - anything else becomes an internal error carrying the value as `data`
    pub fn normalize(value: Value) -> Self {
        match value {
            Value::Object(mut map) => match map.remove("message") {
                Some(Value::String(message)) => Self {
                    code: Some(
                        map.get("code")
                            .and_then(Value::as_i64)
                            .unwrap_or(ErrorCode::InternalError.code()),
                    ),
                    message: Cow::Owned(message),
                    data: map.remove("data"),
                },
                Some(other) => {
                    map.insert("message".to_string(), other);
                    Self::new(ErrorCode::InternalError).with_data(Value::Object(map))
                }
                None => Self::new(ErrorCode::InternalError).with_data(Value::Object(map)),
            },
            Value::String(message) => Self::internal_error(message),
            Value::Null => Self::new(ErrorCode::InternalError),
            other => Self::new(ErrorCode::InternalError).with_data(other),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RpcError {}

/// Error codes the bridge emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotSupported,
    InvalidParams,
    InternalError,
    /// EIP-1193: the origin has not been granted access.
    Unauthorized,
    /// EIP-3326: the chain is unknown to the wallet.
    ChainNotRecognized,
}

impl ErrorCode {
    pub const fn code(&self) -> i64 {
        match *self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotSupported => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Unauthorized => 4100,
            Self::ChainNotRecognized => 4902,
        }
    }

    pub const fn message(&self) -> &'static str {
        match *self {
            Self::ParseError => "JSONRPC_PARSE_ERROR",
            Self::InvalidRequest => "JSONRPC_INVALID_REQUEST",
            Self::MethodNotSupported => "JSONRPC_REQUEST_METHOD_NOT_SUPPORTED",
            Self::InvalidParams => "JSONRPC_INVALID_PARAMS",
            Self::InternalError => "JSONRPC_INTERNAL_ERROR",
            Self::Unauthorized => "JSONRPC_REQUEST_UNAUTHORIZED",
            Self::ChainNotRecognized => "JSONRPC_CHAIN_NOT_RECOGNIZED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejected_has_no_code() {
        let value = serde_json::to_value(RpcError::rejected()).unwrap();
        assert_eq!(value, json!({ "message": "JSONRPC_REQUEST_METHOD_REJECTED" }));
    }

    #[test]
    fn test_normalize_string() {
        let err = RpcError::normalize(json!("nonce too low"));
        assert_eq!(err.code, Some(-32603));
        assert_eq!(err.message, "nonce too low");
    }

    #[test]
    fn test_normalize_structured_keeps_code() {
        let err = RpcError::normalize(json!({ "code": 4001, "message": "denied", "data": [1] }));
        assert_eq!(err.code, Some(4001));
        assert_eq!(err.message, "denied");
        assert_eq!(err.data, Some(json!([1])));
    }

    #[test]
    fn test_normalize_unstructured() {
        let err = RpcError::normalize(json!({ "reason": "boom" }));
        assert_eq!(err.code, Some(-32603));
        assert_eq!(err.message, "JSONRPC_INTERNAL_ERROR");
        assert_eq!(err.data, Some(json!({ "reason": "boom" })));

        let err = RpcError::normalize(json!(42));
        assert_eq!(err.data, Some(json!(42)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RpcError::unauthorized().to_string(),
            "JSONRPC_REQUEST_UNAUTHORIZED (4100)"
        );
        assert_eq!(RpcError::rejected().to_string(), REJECTED_MESSAGE);
    }
}
