//! Protocol Buffer types for Ion biz signaling.
//!
//! This crate holds the wire messages exchanged between clients, biz nodes
//! and the ISLB session-location service, plus the tonic client and server
//! stubs for the `biz.Biz` and `islb.Islb` services. Everything is generated
//! at build time from the schema in `proto/`.
//!
//! - [`ion`] - messages shared by every node type (peers, chat, stream events)
//! - [`biz`] - client-facing signaling (`Signal` bidirectional stream)
//! - [`islb`] - session location (`FindNode`, `WatchEvent`)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting

// Re-export prost traits for convenience
pub use prost::Message;

pub mod biz;
pub mod ion;
pub mod islb;

/// Service type advertised by session-location (ISLB) nodes.
pub const SERVICE_ISLB: &str = "islb";

/// Service type advertised by media-routing (SFU) nodes.
pub const SERVICE_SFU: &str = "sfu";
