//! Requests parked until the user decides.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::ChainConfig;
use crate::host::responder::Responder;
use crate::protocol::{Method, PageMetadata, RequestId};
use crate::transport::PortId;
use crate::translator::TranslatedRequest;

const SESSION_PREFIX: &str = "session:";

/// The channel a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Port(PortId),
    Session(String),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Port(id) => write!(f, "{}", id),
            ChannelId::Session(topic) => write!(f, "{}{}", SESSION_PREFIX, topic),
        }
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(topic) = s.strip_prefix(SESSION_PREFIX) {
            return Ok(ChannelId::Session(topic.to_string()));
        }
        s.parse::<PortId>()
            .map(ChannelId::Port)
            .map_err(|_| format!("invalid channel '{}'", s))
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `{ channel, id }`: unique while the request is pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub channel: ChannelId,
    pub id: RequestId,
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.id)
    }
}

/// What the user is being asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    /// Expose accounts to the subject. `metadata` is a display hint only.
    Connect {
        method: Method,
        #[serde(default)]
        metadata: Option<PageMetadata>,
    },
    AddChain {
        chain: ChainConfig,
        #[serde(default)]
        metadata: Option<PageMetadata>,
    },
    Sign {
        request: TranslatedRequest,
    },
}

/// A decision surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPrompt {
    pub key: PendingKey,
    /// Origin, or `session:<topic>`.
    pub subject: String,
    #[serde(flatten)]
    pub kind: PromptKind,
}

#[derive(Debug)]
pub(crate) struct PendingEntry {
    pub seq: u64,
    pub prompt: DecisionPrompt,
    pub responder: Responder,
}

#[derive(Debug, Default)]
pub(crate) struct PendingRegistry {
    entries: DashMap<PendingKey, PendingEntry>,
    next_seq: AtomicU64,
}

impl PendingRegistry {
    /// Park a prompt. Returns the entry's sequence number, or `None` when the
    /// key is already pending.
    pub fn insert(&self, prompt: DecisionPrompt, responder: Responder) -> Option<u64> {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(prompt.key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(PendingEntry {
                    seq,
                    prompt,
                    responder,
                });
                Some(seq)
            }
        }
    }

    pub fn take(&self, key: &PendingKey) -> Option<PendingEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Remove only if the entry is still the one numbered `seq`.
    pub fn take_if_seq(&self, key: &PendingKey, seq: u64) -> Option<PendingEntry> {
        self.entries
            .remove_if(key, |_, entry| entry.seq == seq)
            .map(|(_, entry)| entry)
    }

    pub fn restore(&self, entry: PendingEntry) {
        self.entries.insert(entry.prompt.key.clone(), entry);
    }

    /// Remove every entry parked on `channel` without answering it.
    pub fn drain_channel(&self, channel: &ChannelId) -> Vec<PendingKey> {
        let keys: Vec<PendingKey> = self
            .entries
            .iter()
            .filter(|entry| &entry.key().channel == channel)
            .map(|entry| entry.key().clone())
            .collect();
        keys.into_iter()
            .filter(|key| self.entries.remove(key).is_some())
            .collect()
    }

    pub fn list(&self) -> Vec<DecisionPrompt> {
        let mut prompts: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.seq, entry.prompt.clone()))
            .collect();
        prompts.sort_by_key(|(seq, _)| *seq);
        prompts.into_iter().map(|(_, prompt)| prompt).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SignerMethod;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn prompt(channel: ChannelId, id: u64) -> DecisionPrompt {
        DecisionPrompt {
            key: PendingKey {
                channel,
                id: RequestId::Number(id),
            },
            subject: "https://dapp.example".into(),
            kind: PromptKind::Sign {
                request: TranslatedRequest {
                    id: RequestId::Number(id),
                    topic: None,
                    method: SignerMethod::PersonalSign,
                    params: vec![json!("hi")],
                },
            },
        }
    }

    fn responder() -> Responder {
        let (tx, _rx) = mpsc::unbounded_channel();
        Responder::port(PortId::new(), &tx)
    }

    #[test]
    fn test_channel_id_round_trip() {
        let port = ChannelId::Port(PortId::new());
        assert_eq!(port.to_string().parse::<ChannelId>().unwrap(), port);

        let session: ChannelId = "session:abc:def".parse().unwrap();
        assert_eq!(session, ChannelId::Session("abc:def".into()));
        assert!("garbage".parse::<ChannelId>().is_err());
    }

    #[test]
    fn test_duplicate_key_refused() {
        let registry = PendingRegistry::default();
        let channel = ChannelId::Session("t".into());
        assert!(registry.insert(prompt(channel.clone(), 1), responder()).is_some());
        assert!(registry.insert(prompt(channel.clone(), 1), responder()).is_none());
        assert!(registry.insert(prompt(channel, 2), responder()).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_take_if_seq_ignores_replaced_entry() {
        let registry = PendingRegistry::default();
        let channel = ChannelId::Session("t".into());
        let first = registry.insert(prompt(channel.clone(), 1), responder()).unwrap();
        let key = PendingKey {
            channel: channel.clone(),
            id: RequestId::Number(1),
        };

        assert!(registry.take(&key).is_some());
        let second = registry.insert(prompt(channel, 1), responder()).unwrap();
        assert_ne!(first, second);

        assert!(registry.take_if_seq(&key, first).is_none());
        assert!(registry.take_if_seq(&key, second).is_some());
    }

    #[test]
    fn test_drain_channel_leaves_other_channels() {
        let registry = PendingRegistry::default();
        let closed = ChannelId::Port(PortId::new());
        let open = ChannelId::Session("t".into());
        registry.insert(prompt(closed.clone(), 1), responder());
        registry.insert(prompt(closed.clone(), 2), responder());
        registry.insert(prompt(open.clone(), 1), responder());

        let mut drained: Vec<_> = registry
            .drain_channel(&closed)
            .into_iter()
            .map(|key| key.id)
            .collect();
        drained.sort_by_key(|id| id.to_string());
        assert_eq!(drained, vec![RequestId::Number(1), RequestId::Number(2)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].key.channel, open);
        assert!(registry.drain_channel(&closed).is_empty());
    }

    #[test]
    fn test_list_in_arrival_order() {
        let registry = PendingRegistry::default();
        for id in [5, 3, 9] {
            registry.insert(prompt(ChannelId::Session("t".into()), id), responder());
        }
        let ids: Vec<_> = registry.list().into_iter().map(|p| p.key.id).collect();
        assert_eq!(
            ids,
            vec![RequestId::Number(5), RequestId::Number(3), RequestId::Number(9)]
        );
    }

    #[test]
    fn test_prompt_json_shape() {
        let value = serde_json::to_value(prompt(ChannelId::Session("t".into()), 1)).unwrap();
        assert_eq!(value["kind"], "sign");
        assert_eq!(value["key"]["channel"], "session:t");
        assert_eq!(value["request"]["method"], "personal_sign");
    }
}
