//! Inbound page-event guard.

use crate::protocol::{Envelope, Target};
use crate::window::{MessageEvent, WindowId};

/// Why a page event was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Event origin differs from the origin captured at load.
    OriginMismatch,
    /// Event was posted by another window.
    ForeignSource,
    /// Payload is not an envelope with a request.
    Malformed,
    /// Envelope is addressed to someone other than the relay.
    WrongTarget,
    /// Envelope is one the relay itself posted to the page.
    OwnEcho,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::OriginMismatch => "origin_mismatch",
            DropReason::ForeignSource => "foreign_source",
            DropReason::Malformed => "malformed",
            DropReason::WrongTarget => "wrong_target",
            DropReason::OwnEcho => "own_echo",
        }
    }
}

/// Admits page events by strict origin equality, same-window source and
/// relay target tag, in that order.
#[derive(Debug, Clone)]
pub struct OriginGuard {
    origin: String,
    source: WindowId,
}

impl OriginGuard {
    pub fn new(origin: impl Into<String>, source: WindowId) -> Self {
        Self {
            origin: origin.into(),
            source,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn admit(&self, event: &MessageEvent) -> Result<Envelope, DropReason> {
        if event.origin != self.origin {
            return Err(DropReason::OriginMismatch);
        }
        if event.source != self.source {
            return Err(DropReason::ForeignSource);
        }

        let envelope: Envelope =
            serde_json::from_value(event.data.clone()).map_err(|_| DropReason::Malformed)?;

        match envelope.target {
            Target::ContentScript if envelope.request.is_some() => Ok(envelope),
            Target::ContentScript => Err(DropReason::Malformed),
            Target::Inpage => Err(DropReason::OwnEcho),
            Target::Unknown => Err(DropReason::WrongTarget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use serde_json::json;

    const ORIGIN: &str = "https://dapp.example";

    fn event(origin: &str, source: WindowId, data: serde_json::Value) -> MessageEvent {
        MessageEvent {
            origin: origin.to_string(),
            source,
            data,
        }
    }

    fn request() -> serde_json::Value {
        json!({
            "target": "wallet-contentscript",
            "id": 7,
            "request": { "method": "eth_accounts", "params": [] }
        })
    }

    #[test]
    fn test_admits_matching_event() {
        let me = WindowId::new();
        let guard = OriginGuard::new(ORIGIN, me);
        let envelope = guard.admit(&event(ORIGIN, me, request())).unwrap();
        assert_eq!(envelope.id, Some(RequestId::Number(7)));
    }

    #[test]
    fn test_origin_compared_strictly() {
        let me = WindowId::new();
        let guard = OriginGuard::new(ORIGIN, me);
        for origin in ["https://dapp.example/", "https://DAPP.example", "https://evil.dapp.example", "*"] {
            assert_eq!(
                guard.admit(&event(origin, me, request())),
                Err(DropReason::OriginMismatch),
                "{origin}"
            );
        }
    }

    #[test]
    fn test_foreign_source() {
        let guard = OriginGuard::new(ORIGIN, WindowId::new());
        assert_eq!(
            guard.admit(&event(ORIGIN, WindowId::new(), request())),
            Err(DropReason::ForeignSource)
        );
    }

    #[test]
    fn test_target_tags() {
        let me = WindowId::new();
        let guard = OriginGuard::new(ORIGIN, me);

        let echo = json!({ "target": "wallet-inpage", "id": 1, "jsonrpc": "2.0", "result": [] });
        assert_eq!(guard.admit(&event(ORIGIN, me, echo)), Err(DropReason::OwnEcho));

        let other = json!({ "target": "metamask-contentscript", "request": { "method": "eth_accounts" } });
        assert_eq!(guard.admit(&event(ORIGIN, me, other)), Err(DropReason::WrongTarget));

        let bare = json!({ "target": "wallet-contentscript", "id": 1 });
        assert_eq!(guard.admit(&event(ORIGIN, me, bare)), Err(DropReason::Malformed));

        assert_eq!(
            guard.admit(&event(ORIGIN, me, json!("hello"))),
            Err(DropReason::Malformed)
        );
    }
}
