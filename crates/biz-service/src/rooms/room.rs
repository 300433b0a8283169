//! A room: the peers sharing one session id, their chat, and fan-out.
//!
//! Fan-out never blocks on a slow peer. Each delivery is a `try_send` into
//! the peer's bounded mailbox; a full mailbox drops that one delivery for
//! that one peer.

use crate::observability::metrics;
use crate::rooms::chat::{ChatEntry, ChatHistory, ChatMessage};
use crate::rooms::peer::{Delivery, Peer};
use proto_gen::biz::SignalReply;
use proto_gen::ion::{Message, StreamEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Host/partner snapshot of a room.
///
/// The first peer to join is the host; everyone after is a partner, in join
/// order. When the host leaves, the earliest partner is promoted.
#[derive(Debug, Clone, Default)]
pub struct RoomInfo {
    pub host: Option<Arc<Peer>>,
    pub partners: Vec<Arc<Peer>>,
}

impl RoomInfo {
    fn add(&mut self, peer: &Arc<Peer>) {
        if self.host.is_none() {
            self.host = Some(Arc::clone(peer));
        } else {
            self.partners.push(Arc::clone(peer));
        }
    }

    fn remove(&mut self, peer: &Arc<Peer>) {
        if self.host.as_ref().is_some_and(|h| Arc::ptr_eq(h, peer)) {
            self.host = if self.partners.is_empty() {
                None
            } else {
                Some(self.partners.remove(0))
            };
        } else {
            self.partners.retain(|p| !Arc::ptr_eq(p, peer));
        }
    }
}

#[derive(Debug, Default)]
struct RoomState {
    peers: HashMap<String, Arc<Peer>>,
    chat: ChatHistory,
    info: RoomInfo,
}

/// A room keyed by session id.
#[derive(Debug)]
pub struct Room {
    sid: String,
    /// Media (SFU) node chosen at creation; fixed for the room's lifetime.
    routing_node_id: String,
    state: RwLock<RoomState>,
}

impl Room {
    pub fn new(sid: impl Into<String>, routing_node_id: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            routing_node_id: routing_node_id.into(),
            state: RwLock::new(RoomState::default()),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn routing_node_id(&self) -> &str {
        &self.routing_node_id
    }

    /// Add `peer`, replacing any peer already registered under its uid.
    ///
    /// Returns the replaced peer, if any.
    pub async fn add_peer(&self, peer: Arc<Peer>) -> Option<Arc<Peer>> {
        let mut state = self.state.write().await;
        let replaced = state.peers.insert(peer.uid().to_string(), Arc::clone(&peer));
        if let Some(old) = &replaced {
            warn!(
                target: "biz.rooms.room",
                sid = %self.sid,
                uid = %peer.uid(),
                "Peer uid already present, replacing"
            );
            state.info.remove(old);
        }
        state.info.add(&peer);
        replaced
    }

    /// Remove `peer` if it is still the one registered under its uid.
    pub async fn remove_peer(&self, peer: &Arc<Peer>) -> bool {
        let mut state = self.state.write().await;
        let is_current = state
            .peers
            .get(peer.uid())
            .is_some_and(|p| Arc::ptr_eq(p, peer));
        if is_current {
            state.peers.remove(peer.uid());
            state.info.remove(peer);
        }
        is_current
    }

    pub async fn get_peer(&self, uid: &str) -> Option<Arc<Peer>> {
        self.state.read().await.peers.get(uid).cloned()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.peers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.peers.is_empty()
    }

    pub async fn info(&self) -> RoomInfo {
        self.state.read().await.info.clone()
    }

    pub async fn add_chat(&self, message: ChatMessage) {
        self.state.write().await.chat.add(message);
    }

    pub async fn chat_history(&self) -> ChatHistory {
        self.state.read().await.chat.clone()
    }

    async fn peers(&self) -> Vec<Arc<Peer>> {
        self.state.read().await.peers.values().cloned().collect()
    }

    /// Relay `msg` to every peer except `except_uid`.
    ///
    /// Returns the number of peers the message was delivered to.
    pub async fn send_message(&self, msg: &Message, except_uid: &str) -> usize {
        let mut delivered = 0;
        for peer in self.peers().await {
            if peer.uid() == except_uid {
                continue;
            }
            let delivery = peer.deliver(SignalReply::msg(msg.clone())).await;
            if self.account(&peer, delivery, "msg") {
                delivered += 1;
            }
        }
        delivered
    }

    /// Push a topology event to every peer and cache it on the peer it is about.
    pub async fn send_stream_event(&self, event: &StreamEvent) -> usize {
        let mut delivered = 0;
        for peer in self.peers().await {
            if peer.uid() == event.uid {
                peer.set_last_stream_event(event.clone()).await;
            }
            let delivery = peer.deliver(SignalReply::stream_event(event.clone())).await;
            if self.account(&peer, delivery, "stream_event") {
                delivered += 1;
            }
        }
        delivered
    }

    fn account(&self, peer: &Peer, delivery: Delivery, kind: &'static str) -> bool {
        match delivery.drop_reason() {
            None => true,
            Some(reason) => {
                metrics::record_message_dropped(reason);
                if delivery == Delivery::MailboxFull {
                    warn!(
                        target: "biz.rooms.room",
                        sid = %self.sid,
                        uid = %peer.uid(),
                        kind,
                        "Peer mailbox full, dropping delivery"
                    );
                } else {
                    debug!(
                        target: "biz.rooms.room",
                        sid = %self.sid,
                        uid = %peer.uid(),
                        kind,
                        "Peer mailbox closed, skipping"
                    );
                }
                false
            }
        }
    }

    /// Point-in-time view for the introspection endpoint.
    pub async fn summary(&self) -> RoomSummary {
        let state = self.state.read().await;
        RoomSummary {
            sid: self.sid.clone(),
            count: state.peers.len(),
            chats: ChatSummary {
                messages: state.chat.entries(),
            },
            host: state.info.host.as_deref().map(PeerSummary::from),
            partners: state
                .info
                .partners
                .iter()
                .map(|p| PeerSummary::from(p.as_ref()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub sid: String,
    pub count: usize,
    pub chats: ChatSummary,
    pub host: Option<PeerSummary>,
    pub partners: Vec<PeerSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub messages: Vec<ChatEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerSummary {
    pub uid: String,
    pub info: String,
}

impl From<&Peer> for PeerSummary {
    fn from(peer: &Peer) -> Self {
        Self {
            uid: peer.uid().to_string(),
            info: String::from_utf8_lossy(peer.info()).into_owned(),
        }
    }
}
