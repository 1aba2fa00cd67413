//! JSON-RPC 2.0 response and error bindings.

pub mod error;
pub mod response;

pub use error::{ErrorCode, RpcError, REJECTED_MESSAGE};
pub use response::{JsonRpcResponse, ResponsePayload, Version};
