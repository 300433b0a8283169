//! Mock ISLB gRPC server.
//!
//! Answers `FindNode` from a fixed node list and keeps every open
//! `WatchEvent` stream so tests can push topology events into it.
//!
//! ```rust,ignore
//! let islb = MockIslbServer::with_sfu("sfu-1").start().await;
//! // ... point a biz node at islb.addr() ...
//! assert_eq!(islb.find_node_count(), 1);
//! islb.push_event(stream_added("room-1", "alice", "s1")).await;
//! ```

use proto_gen::islb::islb_server::{Islb, IslbServer};
use proto_gen::islb::{FindNodeReply, FindNodeRequest, IslbEvent, Node, WatchRequest};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

/// Received `WatchRequest`s, shared with the per-stream reader tasks.
#[derive(Default)]
struct WatchLog {
    requests: Mutex<Vec<WatchRequest>>,
    notify: Option<mpsc::Sender<WatchRequest>>,
}

impl WatchLog {
    async fn record(&self, request: WatchRequest) {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(tx) = &self.notify {
            let _ = tx.send(request).await;
        }
    }
}

/// Mock session-location service.
pub struct MockIslbServer {
    /// Nodes returned by every `FindNode`.
    nodes: Vec<Node>,
    /// Fail `FindNode` with `UNAVAILABLE` instead of answering.
    fail_find_node: bool,
    find_node_count: AtomicU32,
    watch_count: AtomicU32,
    find_node_requests: Mutex<Vec<FindNodeRequest>>,
    watch_log: Arc<WatchLog>,
    /// Event senders of every open `WatchEvent` stream.
    watchers: Mutex<Vec<mpsc::Sender<Result<IslbEvent, Status>>>>,
}

impl MockIslbServer {
    /// Answer `FindNode` with one SFU node `nid`.
    pub fn with_sfu(nid: &str) -> Self {
        Self {
            nodes: vec![Node {
                dc: "dc1".to_string(),
                nid: nid.to_string(),
                service: "sfu".to_string(),
                rpc: String::new(),
            }],
            fail_find_node: false,
            find_node_count: AtomicU32::new(0),
            watch_count: AtomicU32::new(0),
            find_node_requests: Mutex::new(Vec::new()),
            watch_log: Arc::new(WatchLog::default()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Answer `FindNode` with an empty node list.
    pub fn without_nodes() -> Self {
        Self {
            nodes: vec![],
            ..Self::with_sfu("unused")
        }
    }

    /// Fail every `FindNode`.
    pub fn failing() -> Self {
        Self {
            fail_find_node: true,
            ..Self::with_sfu("unused")
        }
    }

    /// Notify `tx` of every received `WatchRequest`.
    pub fn with_watch_request_channel(mut self, tx: mpsc::Sender<WatchRequest>) -> Self {
        self.watch_log = Arc::new(WatchLog {
            requests: Mutex::new(Vec::new()),
            notify: Some(tx),
        });
        self
    }

    /// Serve on an ephemeral localhost port.
    pub async fn start(self) -> RunningMockIslb {
        let mock = Arc::new(self);
        let (addr, cancel_token) = start_mock_islb_server(Arc::clone(&mock)).await;
        RunningMockIslb {
            addr,
            mock,
            cancel_token,
        }
    }

    pub fn find_node_count(&self) -> u32 {
        self.find_node_count.load(Ordering::SeqCst)
    }

    pub fn watch_count(&self) -> u32 {
        self.watch_count.load(Ordering::SeqCst)
    }

    pub fn find_node_requests(&self) -> Vec<FindNodeRequest> {
        self.find_node_requests.lock().unwrap().clone()
    }

    pub fn watch_requests(&self) -> Vec<WatchRequest> {
        self.watch_log.requests.lock().unwrap().clone()
    }

    /// Push `event` into every open watch stream. Returns how many got it.
    pub async fn push_event(&self, event: IslbEvent) -> usize {
        let watchers = self.watchers.lock().unwrap().clone();
        let mut delivered = 0;
        for tx in watchers {
            if tx.send(Ok(event.clone())).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// End every open watch stream with `status`.
    pub async fn fail_watchers(&self, status: Status) {
        let watchers = std::mem::take(&mut *self.watchers.lock().unwrap());
        for tx in watchers {
            let _ = tx.send(Err(status.clone())).await;
        }
    }
}

#[tonic::async_trait]
impl Islb for MockIslbServer {
    async fn find_node(
        &self,
        request: Request<FindNodeRequest>,
    ) -> Result<Response<FindNodeReply>, Status> {
        let inner = request.into_inner();
        self.find_node_count.fetch_add(1, Ordering::SeqCst);
        self.find_node_requests.lock().unwrap().push(inner);

        if self.fail_find_node {
            return Err(Status::unavailable("mock islb unavailable"));
        }
        Ok(Response::new(FindNodeReply {
            nodes: self.nodes.clone(),
        }))
    }

    type WatchEventStream = ReceiverStream<Result<IslbEvent, Status>>;

    async fn watch_event(
        &self,
        request: Request<Streaming<WatchRequest>>,
    ) -> Result<Response<Self::WatchEventStream>, Status> {
        self.watch_count.fetch_add(1, Ordering::SeqCst);
        let mut inbound = request.into_inner();

        let (tx, rx) = mpsc::channel(16);
        self.watchers.lock().unwrap().push(tx);

        let log = Arc::clone(&self.watch_log);
        tokio::spawn(async move {
            while let Some(Ok(request)) = inbound.next().await {
                log.record(request).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// A started [`MockIslbServer`]. Stops serving when dropped.
pub struct RunningMockIslb {
    addr: SocketAddr,
    mock: Arc<MockIslbServer>,
    cancel_token: CancellationToken,
}

impl RunningMockIslb {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` endpoint for a neighbor descriptor.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl std::ops::Deref for RunningMockIslb {
    type Target = MockIslbServer;

    fn deref(&self) -> &Self::Target {
        &self.mock
    }
}

impl Drop for RunningMockIslb {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Serve `mock` on 127.0.0.1 with an ephemeral port.
pub async fn start_mock_islb_server(mock: Arc<MockIslbServer>) -> (SocketAddr, CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

    let server = Server::builder()
        .add_service(IslbServer::from_arc(mock))
        .serve_with_incoming_shutdown(incoming, async move {
            cancel_token_clone.cancelled().await;
        });

    tokio::spawn(async move {
        let _ = server.await;
    });

    // Give the server a moment to start accepting
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, cancel_token)
}
