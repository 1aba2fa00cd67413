//! Wire protocol shared by the page, the relay and the host.
//!
//! # Data Flow
//! ```text
//! page ──Envelope{target: wallet-contentscript}──▶ relay ──Envelope──▶ port ──▶ host
//! page ◀──PageMessage{target: wallet-inpage}────── relay ◀──HostMessage── port ◀── host
//! ```
//!
//! # Design Decisions
//! - Method names decode into a closed enum at the boundary
//! - Control messages (health check, config request) carry no id
//! - Responses are JSON-RPC 2.0; see [`crate::rpc`]

pub mod envelope;
pub mod method;

pub use envelope::{
    Envelope, HostMessage, Notification, PageMessage, PageMetadata, RequestId, RpcRequest, Target,
};
pub use method::{Method, MethodFamily, SignerAction, SignerMethod};
