//! `biz.Biz` gRPC service.
//!
//! Each `Signal` call gets its own [`SignalSession`] task; the response
//! stream is the receiving half of the channel the session writes replies to.

use crate::node::BizNode;
use crate::signal::SignalSession;
use proto_gen::biz::biz_server::Biz;
use proto_gen::biz::{SignalReply, SignalRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, instrument};

/// Replies buffered per stream before the session waits on the client.
const REPLY_BUFFER: usize = 32;

pub struct BizSignalService {
    node: Arc<BizNode>,
}

impl BizSignalService {
    #[must_use]
    pub fn new(node: Arc<BizNode>) -> Self {
        Self { node }
    }
}

#[tonic::async_trait]
impl Biz for BizSignalService {
    type SignalStream = ReceiverStream<Result<SignalReply, Status>>;

    #[instrument(skip_all, name = "biz.grpc.signal")]
    async fn signal(
        &self,
        request: Request<Streaming<SignalRequest>>,
    ) -> Result<Response<Self::SignalStream>, Status> {
        let remote = request.remote_addr();
        let inbound = request.into_inner();

        let (outbound, replies) = mpsc::channel(REPLY_BUFFER);
        let session = SignalSession::new(Arc::clone(&self.node), outbound);
        debug!(
            target: "biz.grpc.biz_service",
            session_id = %session.id(),
            remote = ?remote,
            "Signal stream opened"
        );
        tokio::spawn(session.run(inbound));

        Ok(Response::new(ReceiverStream::new(replies)))
    }
}
