//! Room state: registry, rooms, peers and chat history.
//!
//! ```text
//! RoomRegistry (one per node)
//! └── Room (one per active session id)
//!     ├── Peer (one per joined signaling stream)
//!     ├── ChatHistory (last 5 messages)
//!     └── RoomInfo (host + partners snapshot)
//! ```

pub mod chat;
pub mod peer;
pub mod registry;
pub mod room;

pub use chat::{ChatHistory, ChatMessage, MAX_CHAT_HISTORY};
pub use peer::{Delivery, Peer};
pub use registry::{RoomRegistry, RoomStats};
pub use room::{Room, RoomInfo, RoomSummary};
