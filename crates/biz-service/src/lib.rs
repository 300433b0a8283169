//! Biz signaling node.
//!
//! Accepts long-lived bidirectional `Signal` streams from clients, groups
//! participants into rooms keyed by session id, relays chat between the
//! participants of a room, and forwards media-stream topology events pushed
//! by the session-location service (ISLB).
//!
//! ```text
//! BizNode
//! ├── RoomRegistry ── Room (per sid) ── Peer (per joined stream)
//! ├── ServiceLocator ── IslbApi (discovered from the neighbor set)
//! └── TopologyWatcher ── one WatchEvent stream for the whole node
//! ```
//!
//! # Modules
//!
//! - [`bus`] - neighbor node directory
//! - [`config`] - service configuration from environment
//! - [`errors`] - error taxonomy and client-facing reasons
//! - [`grpc`] - Biz service and ISLB client
//! - [`rooms`] - room registry, rooms, peers, chat history
//! - [`signal`] - per-stream signaling sessions
//! - [`observability`] - HTTP introspection, health and metrics
//! - [`tasks`] - background tasks

pub mod bus;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod node;
pub mod observability;
pub mod rooms;
pub mod signal;
pub mod tasks;

#[cfg(test)]
mod testing;
