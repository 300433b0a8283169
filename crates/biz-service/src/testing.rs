//! In-process fakes for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::bus::{NodeDescriptor, NodeDirectory};
use crate::errors::BizError;
use crate::grpc::islb_client::{IslbApi, IslbEventStream};
use proto_gen::islb::{IslbEvent, Node, WatchRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

pub(crate) fn node(node_id: &str, services: &[&str]) -> NodeDescriptor {
    NodeDescriptor {
        node_id: node_id.to_string(),
        services: services.iter().map(|s| (*s).to_string()).collect(),
        endpoint: format!("http://{node_id}.test:5551"),
    }
}

/// Scriptable session-location service.
pub(crate) struct FakeIslb {
    nodes: Vec<Node>,
    find_error: Option<String>,
    find_delay: Duration,
    pub find_node_calls: AtomicU32,
    pub watch_calls: AtomicU32,
    events: Mutex<Option<mpsc::Receiver<Result<IslbEvent, Status>>>>,
    watch_requests: Mutex<Option<mpsc::Receiver<WatchRequest>>>,
}

impl FakeIslb {
    /// Answers FindNode with one SFU node; WatchEvent is unavailable.
    pub fn with_sfu(nid: &str) -> Self {
        Self {
            nodes: vec![Node {
                dc: "dc1".to_string(),
                nid: nid.to_string(),
                service: "sfu".to_string(),
                rpc: String::new(),
            }],
            find_error: None,
            find_delay: Duration::ZERO,
            find_node_calls: AtomicU32::new(0),
            watch_calls: AtomicU32::new(0),
            events: Mutex::new(None),
            watch_requests: Mutex::new(None),
        }
    }

    /// Answers FindNode with no nodes.
    pub fn empty() -> Self {
        Self {
            nodes: vec![],
            ..Self::with_sfu("unused")
        }
    }

    /// FindNode fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self {
            find_error: Some(message.to_string()),
            ..Self::with_sfu("unused")
        }
    }

    pub fn with_find_delay(mut self, delay: Duration) -> Self {
        self.find_delay = delay;
        self
    }

    /// Make WatchEvent succeed; the returned sender feeds its event stream.
    pub fn with_event_stream(self) -> (Self, mpsc::Sender<Result<IslbEvent, Status>>) {
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(rx);
        (self, tx)
    }

    /// Requests the node sent over the watch stream, once it has been opened.
    pub fn take_watch_requests(&self) -> Option<mpsc::Receiver<WatchRequest>> {
        self.watch_requests.lock().unwrap().take()
    }
}

#[tonic::async_trait]
impl IslbApi for FakeIslb {
    async fn find_node(&self, _service: &str, sid: &str) -> Result<Vec<Node>, BizError> {
        self.find_node_calls.fetch_add(1, Ordering::SeqCst);
        if !self.find_delay.is_zero() {
            tokio::time::sleep(self.find_delay).await;
        }
        match &self.find_error {
            Some(message) => Err(BizError::Grpc(format!("{message} (sid = {sid})"))),
            None => Ok(self.nodes.clone()),
        }
    }

    async fn watch_events(
        &self,
        requests: mpsc::Receiver<WatchRequest>,
    ) -> Result<IslbEventStream, BizError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let events = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BizError::Grpc("WatchEvent unavailable".to_string()))?;
        *self.watch_requests.lock().unwrap() = Some(requests);
        Ok(Box::pin(ReceiverStream::new(events)))
    }
}

/// Directory with a mutable neighbor set and a fixed client.
pub(crate) struct FakeDirectory {
    neighbors: Mutex<Vec<NodeDescriptor>>,
    client: Arc<dyn IslbApi>,
    last_node_id: Mutex<Option<String>>,
    pub client_calls: AtomicU32,
}

impl FakeDirectory {
    pub fn new(neighbors: Vec<NodeDescriptor>, client: Arc<dyn IslbApi>) -> Self {
        Self {
            neighbors: Mutex::new(neighbors),
            client,
            last_node_id: Mutex::new(None),
            client_calls: AtomicU32::new(0),
        }
    }

    pub fn set_neighbors(&self, neighbors: Vec<NodeDescriptor>) {
        *self.neighbors.lock().unwrap() = neighbors;
    }

    pub fn last_node_id(&self) -> Option<String> {
        self.last_node_id.lock().unwrap().clone()
    }
}

impl NodeDirectory for FakeDirectory {
    fn neighbor_nodes(&self) -> Vec<NodeDescriptor> {
        self.neighbors.lock().unwrap().clone()
    }

    fn islb_client(&self, node: &NodeDescriptor) -> Result<Arc<dyn IslbApi>, BizError> {
        self.client_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_node_id.lock().unwrap() = Some(node.node_id.clone());
        Ok(Arc::clone(&self.client))
    }
}
