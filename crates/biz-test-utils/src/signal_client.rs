//! One client `Signal` stream.

use proto_gen::biz::biz_client::BizClient;
use proto_gen::biz::signal_reply::Payload;
use proto_gen::biz::{JoinReply, LeaveReply, SignalReply, SignalRequest};
use proto_gen::ion::{Message, StreamEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Streaming;

/// How long `recv` waits for a reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `assert_silent` listens.
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// An open `Signal` stream. Dropping it closes the stream.
pub struct TestSignalClient {
    requests: mpsc::Sender<SignalRequest>,
    replies: Streaming<SignalReply>,
}

impl TestSignalClient {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let mut client = BizClient::connect(url.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;

        let (requests, rx) = mpsc::channel(16);
        let replies = client
            .signal(ReceiverStream::new(rx))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open signal stream: {}", e))?
            .into_inner();

        Ok(Self { requests, replies })
    }

    pub async fn send(&self, request: SignalRequest) {
        self.requests
            .send(request)
            .await
            .expect("signal stream closed");
    }

    /// Next reply payload; panics on timeout, stream end or error.
    pub async fn recv(&mut self) -> Payload {
        tokio::time::timeout(REPLY_TIMEOUT, self.replies.message())
            .await
            .expect("timed out waiting for reply")
            .expect("signal stream failed")
            .expect("signal stream ended")
            .payload
            .expect("reply without payload")
    }

    pub async fn recv_join(&mut self) -> JoinReply {
        match self.recv().await {
            Payload::JoinReply(reply) => reply,
            other => panic!("expected JoinReply, got {other:?}"),
        }
    }

    pub async fn recv_leave(&mut self) -> LeaveReply {
        match self.recv().await {
            Payload::LeaveReply(reply) => reply,
            other => panic!("expected LeaveReply, got {other:?}"),
        }
    }

    pub async fn recv_msg(&mut self) -> Message {
        match self.recv().await {
            Payload::Msg(msg) => msg,
            other => panic!("expected Msg, got {other:?}"),
        }
    }

    pub async fn recv_stream_event(&mut self) -> StreamEvent {
        match self.recv().await {
            Payload::StreamEvent(event) => event,
            other => panic!("expected StreamEvent, got {other:?}"),
        }
    }

    /// Panic if any reply arrives within a short window.
    pub async fn assert_silent(&mut self) {
        if let Ok(reply) = tokio::time::timeout(SILENCE_WINDOW, self.replies.message()).await {
            panic!("expected no reply, got {reply:?}");
        }
    }

    /// Close the request half and wait until the node ends the stream.
    pub async fn close(mut self) {
        drop(self.requests);
        let end = tokio::time::timeout(REPLY_TIMEOUT, async {
            while let Ok(Some(_)) = self.replies.message().await {}
        })
        .await;
        assert!(end.is_ok(), "node did not end the stream");
    }
}
