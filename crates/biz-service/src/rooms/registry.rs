//! Node-wide map of session id to room.
//!
//! One `RwLock` guards the map. Two compound operations keep the invariant
//! "a room is registered iff it has at least one peer" for every observer:
//!
//! - [`RoomRegistry::join_or_create`] adds the peer while holding the map
//!   lock, so no concurrent leave can delete the room in between. Creators of
//!   the same sid are serialized by a per-sid guard and the routing lookup
//!   runs outside the map lock.
//! - [`RoomRegistry::leave`] removes the peer and, if the room became empty,
//!   deletes it under the map's write lock.

use crate::errors::BizError;
use crate::rooms::peer::Peer;
use crate::rooms::room::{Room, RoomSummary};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Occupancy of one room, as reported by [`RoomRegistry::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    pub sid: String,
    pub peers: usize,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    creating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room for `sid`, or return the one already registered.
    pub async fn create(&self, sid: &str, routing_node_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(sid.to_string())
            .or_insert_with(|| Arc::new(Room::new(sid, routing_node_id)));
        Arc::clone(room)
    }

    pub async fn get(&self, sid: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(sid).cloned()
    }

    pub async fn delete(&self, sid: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(sid)
    }

    pub async fn count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Add `peer` to the room for `sid`, creating the room if needed.
    ///
    /// `locate` resolves the routing node for a new room and is only called
    /// when no room exists, at most once per concurrent burst of joins for
    /// the same sid. A `locate` failure creates nothing.
    ///
    /// Returns the room and whether this call created it.
    pub async fn join_or_create<F, Fut>(
        &self,
        sid: &str,
        peer: Arc<Peer>,
        locate: F,
    ) -> Result<(Arc<Room>, bool), BizError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BizError>>,
    {
        if let Some(room) = self.join_existing(sid, &peer).await {
            return Ok((room, false));
        }

        let guard = {
            let mut creating = self.creating.lock().await;
            Arc::clone(creating.entry(sid.to_string()).or_default())
        };

        let result = {
            let _creation = guard.lock().await;
            self.create_and_join(sid, peer, locate).await
        };

        let mut creating = self.creating.lock().await;
        if creating.get(sid).is_some_and(|g| Arc::ptr_eq(g, &guard)) {
            creating.remove(sid);
        }

        result
    }

    async fn join_existing(&self, sid: &str, peer: &Arc<Peer>) -> Option<Arc<Room>> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(sid)?;
        room.add_peer(Arc::clone(peer)).await;
        Some(Arc::clone(room))
    }

    async fn create_and_join<F, Fut>(
        &self,
        sid: &str,
        peer: Arc<Peer>,
        locate: F,
    ) -> Result<(Arc<Room>, bool), BizError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BizError>>,
    {
        // Another creator may have finished while we waited on the guard.
        if let Some(room) = self.join_existing(sid, &peer).await {
            return Ok((room, false));
        }

        let routing_node_id = locate().await?;

        let mut rooms = self.rooms.write().await;
        let mut created = false;
        let room = Arc::clone(rooms.entry(sid.to_string()).or_insert_with(|| {
            created = true;
            Arc::new(Room::new(sid, routing_node_id.as_str()))
        }));
        room.add_peer(peer).await;

        if created {
            info!(
                target: "biz.rooms.registry",
                sid = %sid,
                routing_node_id = %routing_node_id,
                "Room created"
            );
        }
        Ok((room, created))
    }

    /// Remove `peer` from `room`; delete the room if it is now empty.
    ///
    /// Returns whether the room was deleted.
    pub async fn leave(&self, room: &Arc<Room>, peer: &Arc<Peer>) -> bool {
        let mut rooms = self.rooms.write().await;
        room.remove_peer(peer).await;

        let registered = rooms
            .get(room.sid())
            .is_some_and(|r| Arc::ptr_eq(r, room));
        if registered && room.is_empty().await {
            rooms.remove(room.sid());
            info!(
                target: "biz.rooms.registry",
                sid = %room.sid(),
                "Room deleted (last peer left)"
            );
            return true;
        }

        debug!(
            target: "biz.rooms.registry",
            sid = %room.sid(),
            uid = %peer.uid(),
            "Peer left room"
        );
        false
    }

    /// Per-room occupancy, read under the shared lock.
    pub async fn stats(&self) -> Vec<RoomStats> {
        let rooms = self.rooms.read().await;
        let mut stats = Vec::with_capacity(rooms.len());
        for room in rooms.values() {
            stats.push(RoomStats {
                sid: room.sid().to_string(),
                peers: room.count().await,
            });
        }
        stats
    }

    /// Introspection view of every room, read under the shared lock.
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms.values() {
            summaries.push(room.summary().await);
        }
        summaries
    }
}
