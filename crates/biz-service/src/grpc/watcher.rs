//! Topology event watcher.
//!
//! One `WatchEvent` stream per node, opened by the first room creation and
//! reused for every later one: each new room only sends another
//! `WatchRequest { nid, sid }` over the open stream. Received stream events
//! are routed to the room they name.
//!
//! If opening fails nothing is stored and the next room creation tries
//! again. Once an open stream ends or errors the receive loop exits for
//! good; later watches fail with `BizError::SubscriptionClosed` and no
//! further topology events are delivered.

use crate::errors::BizError;
use crate::grpc::islb_client::{IslbApi, IslbEventStream};
use crate::observability::metrics;
use crate::rooms::RoomRegistry;
use proto_gen::ion::StreamEvent;
use proto_gen::islb::{islb_event, IslbEvent, WatchRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

/// Outbound `WatchRequest` buffer.
const WATCH_REQUEST_BUFFER: usize = 32;

struct Subscription {
    requests: mpsc::Sender<WatchRequest>,
    task: JoinHandle<()>,
}

pub struct TopologyWatcher {
    registry: Arc<RoomRegistry>,
    subscription: Mutex<Option<Subscription>>,
}

impl TopologyWatcher {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            subscription: Mutex::new(None),
        }
    }

    /// Ask for topology events of room `sid` routed through media node `nid`.
    ///
    /// # Errors
    ///
    /// - `BizError::Grpc` if the stream could not be opened
    /// - `BizError::SubscriptionClosed` if the stream has already ended
    #[instrument(skip_all, fields(nid = %nid, sid = %sid))]
    pub async fn watch(
        &self,
        islb: &Arc<dyn IslbApi>,
        nid: &str,
        sid: &str,
    ) -> Result<(), BizError> {
        let request = WatchRequest {
            nid: nid.to_string(),
            sid: sid.to_string(),
        };

        // Held across the open so concurrent room creations cannot both open.
        let mut slot = self.subscription.lock().await;

        if let Some(subscription) = slot.as_ref() {
            if subscription.task.is_finished() {
                return Err(BizError::SubscriptionClosed);
            }
            subscription
                .requests
                .send(request)
                .await
                .map_err(|_| BizError::SubscriptionClosed)?;
            debug!(target: "biz.grpc.watcher", "Watch request sent on open stream");
            return Ok(());
        }

        let (requests, outbound) = mpsc::channel(WATCH_REQUEST_BUFFER);
        requests
            .send(request)
            .await
            .map_err(|e| BizError::Internal(format!("watch request buffer closed: {e}")))?;

        let events = islb.watch_events(outbound).await?;
        let task = tokio::spawn(run_event_loop(Arc::clone(&self.registry), events));
        *slot = Some(Subscription { requests, task });

        info!(target: "biz.grpc.watcher", "Topology event stream opened");
        Ok(())
    }

    /// Whether a stream has been opened and is still being received.
    pub async fn is_active(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }
}

impl Drop for TopologyWatcher {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.task.abort();
        }
    }
}

async fn run_event_loop(registry: Arc<RoomRegistry>, mut events: IslbEventStream) {
    while let Some(item) = events.next().await {
        match item {
            Ok(IslbEvent {
                payload: Some(islb_event::Payload::Stream(event)),
            }) => {
                route_stream_event(&registry, &event).await;
            }
            Ok(IslbEvent { payload: None }) => {
                debug!(target: "biz.grpc.watcher", "Empty topology event ignored");
            }
            Err(status) => {
                warn!(
                    target: "biz.grpc.watcher",
                    code = ?status.code(),
                    error = %status.message(),
                    "Topology event stream failed"
                );
                break;
            }
        }
    }
    info!(
        target: "biz.grpc.watcher",
        "Topology event stream closed, no further events will be routed"
    );
}

/// Deliver `event` to the room it names. Returns whether a room was found.
pub async fn route_stream_event(registry: &RoomRegistry, event: &StreamEvent) -> bool {
    let Some(room) = registry.get(&event.sid).await else {
        metrics::record_topology_event("no_room");
        debug!(
            target: "biz.grpc.watcher",
            sid = %event.sid,
            "Topology event for unknown room ignored"
        );
        return false;
    };

    let delivered = room.send_stream_event(event).await;
    metrics::record_topology_event("routed");
    debug!(
        target: "biz.grpc.watcher",
        sid = %event.sid,
        uid = %event.uid,
        state = event.state().as_str_name(),
        delivered,
        "Topology event routed"
    );
    true
}
