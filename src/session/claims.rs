//! Topic ownership for session sockets.
//!
//! A topic belongs to the socket that first sends on it until that socket
//! closes. Grants name `session:<topic>`, so a topic may only be driven from
//! its owning socket.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Identity of one accepted session socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(Uuid);

impl SocketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct TopicClaims {
    owners: DashMap<String, SocketId>,
}

impl TopicClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `topic` for `socket`. True if the socket owns it afterwards.
    pub fn claim(&self, topic: &str, socket: SocketId) -> bool {
        match self.owners.entry(topic.to_string()) {
            Entry::Occupied(owner) => *owner.get() == socket,
            Entry::Vacant(slot) => {
                slot.insert(socket);
                true
            }
        }
    }

    pub fn owned(&self, socket: SocketId) -> Vec<String> {
        self.owners
            .iter()
            .filter(|entry| *entry.value() == socket)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop every topic held by `socket` and return them.
    pub fn release(&self, socket: SocketId) -> Vec<String> {
        self.owned(socket)
            .into_iter()
            .filter(|topic| self.owners.remove_if(topic, |_, owner| *owner == socket).is_some())
            .collect()
    }

    pub fn owner(&self, topic: &str) -> Option<SocketId> {
        self.owners.get(topic).map(|owner| *owner)
    }
}
