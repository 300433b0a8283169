//! Bounded per-room chat history.

use chrono::Utc;
use proto_gen::ion;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// Number of chat messages retained per room.
pub const MAX_CHAT_HISTORY: usize = 5;

/// A chat message as retained by a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// UID of the peer that sent the message. `None` if unknown.
    pub from: Option<String>,
    pub to: String,
    pub data: Vec<u8>,
    /// Wall-clock receive time, nanoseconds since the Unix epoch.
    pub unix_nano: i64,
}

impl ChatMessage {
    /// Capture `msg` as sent by peer `from`, stamped with the current time.
    pub fn received(from: Option<&str>, msg: &ion::Message) -> Self {
        Self {
            from: from.map(str::to_string),
            to: msg.to.clone(),
            data: msg.data.clone(),
            unix_nano: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        }
    }
}

/// JSON view of a retained message, as served by the introspection endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub from: Option<String>,
    pub data: String,
    pub unix_nano: i64,
}

impl From<&ChatMessage> for ChatEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            from: message.from.clone(),
            data: String::from_utf8_lossy(&message.data).into_owned(),
            unix_nano: message.unix_nano,
        }
    }
}

/// FIFO of the last [`MAX_CHAT_HISTORY`] messages, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
}

impl ChatHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, evicting the oldest when over capacity.
    ///
    /// Messages with no originating peer are ignored.
    pub fn add(&mut self, message: ChatMessage) {
        if message.from.is_none() {
            return;
        }
        self.messages.push_back(message);
        while self.messages.len() > MAX_CHAT_HISTORY {
            self.messages.pop_front();
        }
        debug!(target: "biz.rooms.chat", len = self.messages.len(), "Chat history updated");
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn entries(&self) -> Vec<ChatEntry> {
        self.messages.iter().map(ChatEntry::from).collect()
    }
}
