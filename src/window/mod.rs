//! Page-side context: the window message channel and the DOM contract.
//!
//! # Design Decisions
//! - Every listener on a window sees every event; listeners filter by origin,
//!   source and target tag themselves
//! - The DOM is reached through [`PageDocument`] so the relay can be driven
//!   from a real page or from a snapshot

pub mod channel;
pub mod document;

pub use channel::{MessageEvent, Window, WindowId};
pub use document::{IconLink, PageDocument, StaticDocument};
