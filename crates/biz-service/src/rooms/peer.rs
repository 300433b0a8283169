//! A participant bound to one signaling stream and one room.

use proto_gen::biz::SignalReply;
use proto_gen::ion::StreamEvent;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// Result of pushing a reply into a peer's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Mailbox at capacity; the reply was dropped.
    MailboxFull,
    /// Peer closed or its session is gone.
    MailboxClosed,
}

impl Delivery {
    /// Bounded label for the `biz_messages_dropped_total` reason metric.
    pub fn drop_reason(self) -> Option<&'static str> {
        match self {
            Delivery::Delivered => None,
            Delivery::MailboxFull => Some("mailbox_full"),
            Delivery::MailboxClosed => Some("mailbox_closed"),
        }
    }
}

/// A participant in a room.
///
/// Replies pushed by the room (relayed chat, stream events) go into the
/// mailbox owned by the peer's signaling session. [`Peer::close`] releases
/// the mailbox; nothing is delivered afterwards.
#[derive(Debug)]
pub struct Peer {
    sid: String,
    uid: String,
    info: Vec<u8>,
    mailbox: RwLock<Option<mpsc::Sender<SignalReply>>>,
    last_stream_event: RwLock<Option<StreamEvent>>,
}

impl Peer {
    pub fn new(
        sid: impl Into<String>,
        uid: impl Into<String>,
        info: Vec<u8>,
        mailbox: mpsc::Sender<SignalReply>,
    ) -> Self {
        Self {
            sid: sid.into(),
            uid: uid.into(),
            info,
            mailbox: RwLock::new(Some(mailbox)),
            last_stream_event: RwLock::new(None),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Opaque client metadata supplied on join.
    pub fn info(&self) -> &[u8] {
        &self.info
    }

    /// Push a reply without waiting.
    pub async fn deliver(&self, reply: SignalReply) -> Delivery {
        let mailbox = self.mailbox.read().await;
        let Some(tx) = mailbox.as_ref() else {
            return Delivery::MailboxClosed;
        };
        match tx.try_send(reply) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::MailboxFull,
            Err(TrySendError::Closed(_)) => Delivery::MailboxClosed,
        }
    }

    /// Release the outbound mailbox. Idempotent.
    pub async fn close(&self) {
        self.mailbox.write().await.take();
    }

    pub async fn is_closed(&self) -> bool {
        self.mailbox.read().await.is_none()
    }

    pub async fn set_last_stream_event(&self, event: StreamEvent) {
        *self.last_stream_event.write().await = Some(event);
    }

    /// Most recent topology event addressed to this peer's uid.
    pub async fn last_stream_event(&self) -> Option<StreamEvent> {
        self.last_stream_event.read().await.clone()
    }
}
