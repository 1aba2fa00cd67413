//! Envelope types carried over the window channel and the transport port.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::protocol::method::{Method, CONFIG_CHANGED};
use crate::rpc::{JsonRpcResponse, Version};

/// Logical addressee of an envelope on the window channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Page → relay.
    #[serde(rename = "wallet-contentscript")]
    ContentScript,
    /// Relay → page.
    #[serde(rename = "wallet-inpage")]
    Inpage,
    #[serde(other)]
    Unknown,
}

/// Caller-chosen correlation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl RequestId {
    /// Parse a path segment: digits become a numeric id.
    pub fn from_segment(segment: &str) -> Self {
        match segment.parse::<u64>() {
            Ok(n) => RequestId::Number(n),
            Err(_) => RequestId::String(segment.to_string()),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

/// The `request` member of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: Method,
    #[serde(default, deserialize_with = "deserialize_params")]
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl RpcRequest {
    pub fn new(method: impl Into<Method>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            origin: None,
        }
    }
}

/// Accept `params` as an array, a single value, or null.
fn deserialize_params<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Wire envelope: `{ target, id?, request? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RpcRequest>,
}

impl Envelope {
    /// A page request addressed to the relay.
    pub fn to_relay(id: impl Into<RequestId>, request: RpcRequest) -> Self {
        Self {
            target: Target::ContentScript,
            id: Some(id.into()),
            request: Some(request),
        }
    }

    /// A bridge-synthesized control message. Carries no id.
    pub fn control(method: Method, origin: &str) -> Self {
        Self {
            target: Target::ContentScript,
            id: None,
            request: Some(RpcRequest {
                method,
                params: Vec::new(),
                origin: Some(origin.to_string()),
            }),
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.request.as_ref().map(|r| &r.method)
    }

    pub fn is_control(&self) -> bool {
        self.id.is_none() && self.method().is_some_and(Method::is_reserved)
    }
}

/// Display hints the relay reads from the page DOM.
///
/// These are untrusted: the host shows them in prompts and never uses them in
/// a permission decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub icon: String,
}

impl PageMetadata {
    /// Recover the metadata the relay appended as the last param.
    pub fn from_params(params: &[Value]) -> Option<Self> {
        let last = params.last()?;
        if !last.is_object() {
            return None;
        }
        serde_json::from_value(last.clone()).ok()
    }
}

/// Host-originated notification (no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: Version,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    pub fn config_changed(config: Value) -> Self {
        Self {
            jsonrpc: Version::V2,
            method: CONFIG_CHANGED.to_string(),
            params: config,
        }
    }
}

/// Anything the host sends back over a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostMessage {
    Response(JsonRpcResponse),
    Notification(Notification),
}

impl HostMessage {
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            HostMessage::Response(response) => Some(&response.id),
            HostMessage::Notification(_) => None,
        }
    }
}

impl From<JsonRpcResponse> for HostMessage {
    fn from(response: JsonRpcResponse) -> Self {
        HostMessage::Response(response)
    }
}

/// A host message re-tagged for the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    pub target: Target,
    #[serde(flatten)]
    pub body: HostMessage,
}

impl PageMessage {
    pub fn for_page(body: HostMessage) -> Self {
        Self {
            target: Target::Inpage,
            body,
        }
    }
}
