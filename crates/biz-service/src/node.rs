//! State shared by every signaling session of one biz node.

use crate::bus::NodeDirectory;
use crate::grpc::locator::ServiceLocator;
use crate::grpc::watcher::TopologyWatcher;
use crate::rooms::RoomRegistry;
use std::sync::Arc;

pub struct BizNode {
    node_id: String,
    registry: Arc<RoomRegistry>,
    locator: ServiceLocator,
    watcher: TopologyWatcher,
    peer_mailbox_capacity: usize,
}

impl BizNode {
    pub fn new(
        node_id: impl Into<String>,
        directory: Arc<dyn NodeDirectory>,
        peer_mailbox_capacity: usize,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        Self {
            node_id: node_id.into(),
            watcher: TopologyWatcher::new(Arc::clone(&registry)),
            locator: ServiceLocator::new(directory),
            registry,
            peer_mailbox_capacity: peer_mailbox_capacity.max(1),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn locator(&self) -> &ServiceLocator {
        &self.locator
    }

    pub fn watcher(&self) -> &TopologyWatcher {
        &self.watcher
    }

    /// Capacity of each peer's outbound mailbox.
    pub fn peer_mailbox_capacity(&self) -> usize {
        self.peer_mailbox_capacity
    }
}
