//! Per-stream signaling session.
//!
//! One session task runs for each open `Signal` stream. It owns the stream's
//! binding to a room, which moves through:
//!
//! ```text
//! Idle --Join ok--> Joined --Leave(own uid)--> Idle
//!   \                  |
//!    \                 +--stream end/error--> Terminated (peer removed)
//!     +--stream end/error--> Terminated
//! ```
//!
//! A reader task forwards inbound requests, and the stream's final error or
//! end, over one channel so they are handled strictly in arrival order. The
//! session loop selects over that channel and the bound peer's mailbox,
//! which carries chat and stream events pushed by the room. Each join gets a
//! fresh mailbox; releasing the binding drops it along with anything still
//! queued, so nothing from a left room reaches the client.

use crate::errors::BizError;
use crate::node::BizNode;
use crate::observability::metrics;
use crate::rooms::{ChatMessage, Peer, Room};
use proto_gen::biz::signal_request::Payload;
use proto_gen::biz::{Join, Leave, SignalReply, SignalRequest};
use proto_gen::{ion, SERVICE_SFU};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, info, instrument, warn};

/// Inbound items buffered between the reader task and the session loop.
const INBOUND_BUFFER: usize = 16;

/// Reply sent on a successful join.
pub const JOIN_SUCCESS_REASON: &str = "join success.";

/// Reply sent on a successful leave.
pub const LEAVE_REASON: &str = "closed";

/// Items forwarded by the reader task, in arrival order.
#[derive(Debug)]
enum Inbound {
    Request(SignalRequest),
    /// The stream ended; `Some` carries the receive error.
    Closed(Option<Status>),
}

/// The client is no longer reading replies.
#[derive(Debug)]
struct Disconnected;

/// The room and peer a session is joined as.
struct Binding {
    room: Arc<Room>,
    peer: Arc<Peer>,
    mailbox: mpsc::Receiver<SignalReply>,
}

pub struct SignalSession {
    id: String,
    node: Arc<BizNode>,
    binding: Option<Binding>,
    outbound: mpsc::Sender<Result<SignalReply, Status>>,
}

impl SignalSession {
    /// Create a session writing its replies to `outbound`.
    pub fn new(node: Arc<BizNode>, outbound: mpsc::Sender<Result<SignalReply, Status>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node,
            binding: None,
            outbound,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the session until the inbound stream ends or the client stops
    /// reading, then release any room binding.
    pub async fn run<S>(mut self, inbound: S)
    where
        S: Stream<Item = Result<SignalRequest, Status>> + Send + Unpin + 'static,
    {
        let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let reader = tokio::spawn(read_inbound(inbound, inbound_tx));

        info!(target: "biz.signal.session", session_id = %self.id, "Signal session started");

        loop {
            tokio::select! {
                item = inbound_rx.recv() => match item {
                    Some(Inbound::Request(request)) => {
                        if self.handle_request(request).await.is_err() {
                            break;
                        }
                    }
                    Some(Inbound::Closed(Some(status))) => {
                        warn!(
                            target: "biz.signal.session",
                            session_id = %self.id,
                            code = ?status.code(),
                            error = %status.message(),
                            "Signal stream receive failed"
                        );
                        break;
                    }
                    Some(Inbound::Closed(None)) | None => {
                        debug!(
                            target: "biz.signal.session",
                            session_id = %self.id,
                            "Signal stream closed by client"
                        );
                        break;
                    }
                },
                Some(reply) = next_delivery(&mut self.binding) => {
                    if self.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        }

        reader.abort();
        self.terminate().await;
    }

    async fn handle_request(&mut self, request: SignalRequest) -> Result<(), Disconnected> {
        match request.payload {
            Some(Payload::Join(join)) => {
                metrics::record_signal_request("join");
                self.handle_join(join).await
            }
            Some(Payload::Leave(leave)) => {
                metrics::record_signal_request("leave");
                self.handle_leave(leave).await
            }
            Some(Payload::Msg(msg)) => {
                metrics::record_signal_request("msg");
                self.handle_message(&msg).await;
                Ok(())
            }
            None => {
                debug!(
                    target: "biz.signal.session",
                    session_id = %self.id,
                    "Empty signal request ignored"
                );
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(session_id = %self.id))]
    async fn handle_join(&mut self, join: Join) -> Result<(), Disconnected> {
        let Some(peer) = join.peer else {
            metrics::record_join("invalid");
            warn!(target: "biz.signal.session", "Join without peer rejected");
            return self
                .send(SignalReply::join(false, "join request without peer"))
                .await;
        };

        let sid = peer.sid.clone();
        let uid = peer.uid.clone();
        let reply = match self.join(peer).await {
            Ok(()) => {
                metrics::record_join("success");
                info!(
                    target: "biz.signal.session",
                    sid = %sid,
                    uid = %uid,
                    "Peer joined"
                );
                SignalReply::join(true, JOIN_SUCCESS_REASON)
            }
            Err(e) => {
                metrics::record_join(e.outcome_label());
                warn!(
                    target: "biz.signal.session",
                    sid = %sid,
                    uid = %uid,
                    error = %e,
                    "Join failed"
                );
                SignalReply::join(false, e.join_reason(&sid))
            }
        };
        self.send(reply).await
    }

    async fn join(&mut self, peer: ion::Peer) -> Result<(), BizError> {
        let islb = self
            .node
            .locator()
            .islb()
            .await
            .ok_or(BizError::IslbNotFound)?;

        if let Some(binding) = &self.binding {
            return Err(BizError::AlreadyJoined {
                sid: binding.room.sid().to_string(),
                uid: binding.peer.uid().to_string(),
            });
        }

        let ion::Peer { sid, uid, info } = peer;
        let (mailbox_tx, mailbox) = mpsc::channel(self.node.peer_mailbox_capacity());
        let peer = Arc::new(Peer::new(sid.clone(), uid, info, mailbox_tx));

        let locate_islb = Arc::clone(&islb);
        let locate_sid = sid.clone();
        let (room, created) = self
            .node
            .registry()
            .join_or_create(&sid, Arc::clone(&peer), || async move {
                let nodes = locate_islb.find_node(SERVICE_SFU, &locate_sid).await?;
                nodes
                    .into_iter()
                    .next()
                    .map(|node| node.nid)
                    .ok_or_else(|| BizError::NodeNotFound {
                        service: SERVICE_SFU.to_string(),
                        sid: locate_sid.clone(),
                    })
            })
            .await?;

        if created {
            if let Err(e) = self
                .node
                .watcher()
                .watch(&islb, room.routing_node_id(), room.sid())
                .await
            {
                warn!(
                    target: "biz.signal.session",
                    sid = %room.sid(),
                    error = %e,
                    "Topology watch failed, room will not receive stream events"
                );
            }
        }

        self.binding = Some(Binding {
            room,
            peer,
            mailbox,
        });
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.id, uid = %leave.uid))]
    async fn handle_leave(&mut self, leave: Leave) -> Result<(), Disconnected> {
        let bound_as_uid = self
            .binding
            .as_ref()
            .is_some_and(|b| b.peer.uid() == leave.uid);
        if !bound_as_uid {
            debug!(
                target: "biz.signal.session",
                "Leave for a uid this stream is not joined as, ignored"
            );
            return Ok(());
        }

        if let Some(binding) = self.binding.take() {
            self.release(binding).await;
        }
        self.send(SignalReply::leave(LEAVE_REASON)).await
    }

    async fn handle_message(&self, msg: &ion::Message) {
        let Some(binding) = &self.binding else {
            warn!(
                target: "biz.signal.session",
                session_id = %self.id,
                from = %msg.from,
                "Message before join ignored"
            );
            return;
        };

        let sender = binding.peer.uid();
        binding
            .room
            .add_chat(ChatMessage::received(Some(sender), msg))
            .await;
        let delivered = binding.room.send_message(msg, sender).await;
        debug!(
            target: "biz.signal.session",
            session_id = %self.id,
            sid = %binding.room.sid(),
            from = %sender,
            delivered,
            "Message relayed"
        );
    }

    async fn release(&self, binding: Binding) {
        let Binding { room, peer, mailbox } = binding;
        let deleted = self.node.registry().leave(&room, &peer).await;
        peer.close().await;
        drop(mailbox);
        info!(
            target: "biz.signal.session",
            session_id = %self.id,
            sid = %room.sid(),
            uid = %peer.uid(),
            room_deleted = deleted,
            "Peer left"
        );
    }

    async fn send(&self, reply: SignalReply) -> Result<(), Disconnected> {
        self.outbound.send(Ok(reply)).await.map_err(|_| {
            debug!(
                target: "biz.signal.session",
                session_id = %self.id,
                "Client stopped reading replies"
            );
            Disconnected
        })
    }

    async fn terminate(mut self) {
        if let Some(binding) = self.binding.take() {
            self.release(binding).await;
        }
        info!(target: "biz.signal.session", session_id = %self.id, "Signal session terminated");
    }
}

/// Next reply pushed to the bound peer; pending while unbound.
async fn next_delivery(binding: &mut Option<Binding>) -> Option<SignalReply> {
    match binding {
        Some(binding) => binding.mailbox.recv().await,
        None => std::future::pending().await,
    }
}

async fn read_inbound<S>(mut inbound: S, tx: mpsc::Sender<Inbound>)
where
    S: Stream<Item = Result<SignalRequest, Status>> + Unpin,
{
    loop {
        let item = match inbound.next().await {
            Some(Ok(request)) => Inbound::Request(request),
            Some(Err(status)) => Inbound::Closed(Some(status)),
            None => Inbound::Closed(None),
        };
        let is_last = matches!(item, Inbound::Closed(_));
        if tx.send(item).await.is_err() || is_last {
            break;
        }
    }
}
