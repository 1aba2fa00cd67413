//! JSON-RPC 2.0 response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::RequestId;
use crate::rpc::error::RpcError;

/// The `jsonrpc` member. Only "2.0" is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    #[serde(rename = "2.0")]
    V2,
}

/// `{ id, jsonrpc: "2.0", result }` or `{ id, jsonrpc: "2.0", error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Version,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    #[serde(rename = "result")]
    Success(Value),
    #[serde(rename = "error")]
    Error(RpcError),
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Version::V2,
            id,
            payload: ResponsePayload::Success(result),
        }
    }

    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: Version::V2,
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Success(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.payload {
            ResponsePayload::Success(_) => None,
            ResponsePayload::Error(err) => Some(err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.payload {
            ResponsePayload::Success(value) => Ok(value),
            ResponsePayload::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let response = JsonRpcResponse::success(RequestId::Number(1), json!("0xDEADBEEF"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "id": 1, "jsonrpc": "2.0", "result": "0xDEADBEEF" })
        );
    }

    #[test]
    fn test_null_result_is_kept() {
        let response = JsonRpcResponse::success(RequestId::from("a"), Value::Null);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({ "id": "a", "jsonrpc": "2.0", "result": null }));
        let back: JsonRpcResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back.result(), Some(&Value::Null));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let raw = json!({ "id": 1, "jsonrpc": "1.0", "result": 1 });
        assert!(serde_json::from_value::<JsonRpcResponse>(raw).is_err());
    }
}
