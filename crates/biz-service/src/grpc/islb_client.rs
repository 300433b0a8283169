//! Session-location (ISLB) gRPC client.
//!
//! [`IslbApi`] is the seam the rest of the node programs against: the
//! locator hands out `Arc<dyn IslbApi>`, and tests substitute fakes.
//! [`GrpcIslbClient`] is the production implementation over a tonic channel.
//!
//! # Connection Pattern
//!
//! The channel is created lazily (no connection until the first RPC) and is
//! cheaply cloneable, so each call clones the generated client instead of
//! locking a shared one. Every RPC is bounded by the configured timeout.

use crate::errors::BizError;
use crate::observability::metrics;
use proto_gen::islb::islb_client::IslbClient;
use proto_gen::islb::{FindNodeRequest, IslbEvent, Node, WatchRequest};
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, error, instrument, warn};

/// Connect timeout for the lazily established channel.
const ISLB_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Inbound half of an open `WatchEvent` stream.
pub type IslbEventStream = Pin<Box<dyn Stream<Item = Result<IslbEvent, Status>> + Send>>;

/// Operations the biz node needs from the session-location service.
#[tonic::async_trait]
pub trait IslbApi: Send + Sync {
    /// Find the nodes of `service` type currently serving room `sid`.
    async fn find_node(&self, service: &str, sid: &str) -> Result<Vec<Node>, BizError>;

    /// Open the bidirectional topology event stream.
    ///
    /// Every `WatchRequest` sent on `requests` is forwarded over the stream
    /// for as long as it stays open.
    async fn watch_events(
        &self,
        requests: mpsc::Receiver<WatchRequest>,
    ) -> Result<IslbEventStream, BizError>;
}

/// tonic-backed [`IslbApi`].
#[derive(Debug, Clone)]
pub struct GrpcIslbClient {
    client: IslbClient<Channel>,
    endpoint: String,
    rpc_timeout: Duration,
}

impl GrpcIslbClient {
    /// Create a client without connecting.
    ///
    /// # Errors
    ///
    /// Returns `BizError::Config` if the endpoint is not a valid URI.
    pub fn connect_lazy(endpoint: &str, rpc_timeout: Duration) -> Result<Self, BizError> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| {
                error!(
                    target: "biz.grpc.islb_client",
                    error = %e,
                    endpoint = %endpoint,
                    "Invalid ISLB endpoint"
                );
                BizError::Config(format!("Invalid ISLB endpoint: {e}"))
            })?
            .connect_timeout(ISLB_CONNECT_TIMEOUT)
            .connect_lazy();

        debug!(
            target: "biz.grpc.islb_client",
            endpoint = %endpoint,
            "ISLB client created"
        );

        Ok(Self {
            client: IslbClient::new(channel),
            endpoint: endpoint.to_string(),
            rpc_timeout,
        })
    }
}

#[tonic::async_trait]
impl IslbApi for GrpcIslbClient {
    #[instrument(skip_all, fields(service = %service, sid = %sid))]
    async fn find_node(&self, service: &str, sid: &str) -> Result<Vec<Node>, BizError> {
        let mut client = self.client.clone();
        let request = Request::new(FindNodeRequest {
            service: service.to_string(),
            sid: sid.to_string(),
            nid: String::new(),
        });

        let start = Instant::now();
        let result = tokio::time::timeout(self.rpc_timeout, client.find_node(request)).await;
        metrics::record_islb_rpc_latency("find_node", start.elapsed());

        match result {
            Ok(Ok(response)) => {
                let nodes = response.into_inner().nodes;
                debug!(
                    target: "biz.grpc.islb_client",
                    node_count = nodes.len(),
                    "FindNode answered"
                );
                Ok(nodes)
            }
            Ok(Err(status)) => {
                warn!(
                    target: "biz.grpc.islb_client",
                    endpoint = %self.endpoint,
                    code = ?status.code(),
                    error = %status.message(),
                    "FindNode failed"
                );
                Err(BizError::Grpc(format!(
                    "FindNode rejected: {}",
                    status.message()
                )))
            }
            Err(_) => {
                warn!(
                    target: "biz.grpc.islb_client",
                    endpoint = %self.endpoint,
                    timeout_secs = self.rpc_timeout.as_secs(),
                    "FindNode timed out"
                );
                Err(BizError::Grpc(format!(
                    "FindNode timed out after {}s",
                    self.rpc_timeout.as_secs()
                )))
            }
        }
    }

    #[instrument(skip_all)]
    async fn watch_events(
        &self,
        requests: mpsc::Receiver<WatchRequest>,
    ) -> Result<IslbEventStream, BizError> {
        let mut client = self.client.clone();
        let outbound = ReceiverStream::new(requests);

        let start = Instant::now();
        let result = tokio::time::timeout(self.rpc_timeout, client.watch_event(outbound)).await;
        metrics::record_islb_rpc_latency("watch_event", start.elapsed());

        match result {
            Ok(Ok(response)) => Ok(Box::pin(response.into_inner())),
            Ok(Err(status)) => {
                warn!(
                    target: "biz.grpc.islb_client",
                    endpoint = %self.endpoint,
                    code = ?status.code(),
                    error = %status.message(),
                    "WatchEvent open failed"
                );
                Err(BizError::Grpc(format!(
                    "WatchEvent rejected: {}",
                    status.message()
                )))
            }
            Err(_) => {
                warn!(
                    target: "biz.grpc.islb_client",
                    endpoint = %self.endpoint,
                    timeout_secs = self.rpc_timeout.as_secs(),
                    "WatchEvent open timed out"
                );
                Err(BizError::Grpc(format!(
                    "WatchEvent timed out after {}s",
                    self.rpc_timeout.as_secs()
                )))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_lazy_accepts_valid_endpoint() {
        let client = GrpcIslbClient::connect_lazy("http://127.0.0.1:1", Duration::from_secs(1));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_find_node_against_unreachable_endpoint_fails() {
        // Port 1 on loopback refuses connections.
        let client =
            GrpcIslbClient::connect_lazy("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();

        let result = client.find_node("sfu", "room-1").await;
        assert!(matches!(result, Err(BizError::Grpc(_))));
    }
}
