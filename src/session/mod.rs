//! Session entry subsystem.
//!
//! # Data Flow
//! ```text
//! GET /session (websocket)
//!     text frame { id, params: { topic, request } }
//!     → WalletHost::handle_session (subject "session:<topic>")
//!     ← { topic, response } frames
//!
//! /admin/* (Bearer api key)
//!     → status, pending prompts, approve / reject / dismiss, grants
//! ```
//!
//! # Design Decisions
//! - Session traffic is signer verbs only; the translator refuses the rest
//! - A topic is owned by the first socket that sends on it; other sockets
//!   are refused with 4100 until the owner closes
//! - A closed socket turns later decisions for its topics into drops

pub mod admin;
pub mod auth;
pub mod claims;
pub mod server;

pub use server::{SessionServer, SessionState};
