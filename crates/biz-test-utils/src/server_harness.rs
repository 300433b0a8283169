//! Test server harness for end-to-end signaling tests.
//!
//! Provides `TestBizServer`, which runs the real `biz.Biz` gRPC service
//! and node state on an ephemeral port.

use crate::signal_client::TestSignalClient;
use biz_service::bus::{NodeDescriptor, NodeDirectory, StaticNodeDirectory};
use biz_service::config::Config;
use biz_service::grpc::BizSignalService;
use biz_service::node::BizNode;
use proto_gen::biz::biz_server::BizServer;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning a biz node in integration tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_join() -> Result<(), anyhow::Error> {
///     let islb = MockIslbServer::with_sfu("sfu-1").start().await;
///     let server = TestBizServer::spawn_with_islb(islb.addr()).await?;
///     let mut client = server.connect().await?;
///     client.send(join_request("room-1", "alice")).await;
///     assert!(client.recv_join().await.success);
///     Ok(())
/// }
/// ```
pub struct TestBizServer {
    addr: SocketAddr,
    node: Arc<BizNode>,
    config: Config,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestBizServer {
    /// Spawn a node whose neighbor set is `neighbors`
    /// (`node_id=service[+service]@endpoint`, comma separated).
    ///
    /// # Returns
    /// * `Ok(TestBizServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If configuration or bind fails
    pub async fn spawn(neighbors: &str) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIZ_NODE_ID".to_string(), "biz-test".to_string()),
            (
                "BIZ_GRPC_BIND_ADDRESS".to_string(),
                "127.0.0.1:0".to_string(),
            ),
            ("BIZ_NEIGHBORS".to_string(), neighbors.to_string()),
            ("BIZ_ISLB_RPC_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("BIZ_PEER_MAILBOX_CAPACITY".to_string(), "16".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let directory: Arc<dyn NodeDirectory> = Arc::new(StaticNodeDirectory::new(
            config.neighbors.clone(),
            config.islb_rpc_timeout(),
        ));
        let node = Arc::new(BizNode::new(
            config.node_id.clone(),
            directory,
            config.peer_mailbox_capacity,
        ));

        let listener = tokio::net::TcpListener::bind(config.grpc_bind_address.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let cancel_token = CancellationToken::new();
        let shutdown = cancel_token.clone();
        let server = tonic::transport::Server::builder()
            .add_service(BizServer::new(BizSignalService::new(Arc::clone(&node))))
            .serve_with_incoming_shutdown(
                tokio_stream::wrappers::TcpListenerStream::new(listener),
                async move { shutdown.cancelled().await },
            );

        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(Self {
            addr,
            node,
            config,
            cancel_token,
            _handle: handle,
        })
    }

    /// Spawn a node with a single ISLB neighbor served at `islb_addr`.
    pub async fn spawn_with_islb(islb_addr: SocketAddr) -> Result<Self, anyhow::Error> {
        let islb = NodeDescriptor {
            node_id: "islb-1".to_string(),
            services: vec![proto_gen::SERVICE_ISLB.to_string()],
            endpoint: format!("http://{islb_addr}"),
        };
        Self::spawn(&islb.to_string()).await
    }

    /// Open a new `Signal` stream to this node.
    pub async fn connect(&self) -> Result<TestSignalClient, anyhow::Error> {
        TestSignalClient::connect(&self.url()).await
    }

    /// Node state, for inspecting rooms.
    pub fn node(&self) -> &Arc<BizNode> {
        &self.node
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestBizServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self._handle.abort();
    }
}
