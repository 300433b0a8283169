//! Periodic room occupancy report.
//!
//! Every interval the task logs one block listing each non-empty room and
//! refreshes the `biz_rooms_active` / `biz_peers_active` gauges. Exits when
//! the cancellation token fires.

use crate::observability::metrics;
use crate::rooms::{RoomRegistry, RoomStats};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub async fn run_stat_task(
    registry: Arc<RoomRegistry>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(target: "biz.tasks.stat", interval_secs = interval.as_secs(), "Stat task started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = registry.stats().await;
                report(&stats);
            }
            () = cancel_token.cancelled() => {
                info!(target: "biz.tasks.stat", "Stat task received shutdown signal, exiting");
                break;
            }
        }
    }
}

fn report(stats: &[RoomStats]) {
    let peers: usize = stats.iter().map(|s| s.peers).sum();
    metrics::set_rooms_active(stats.len());
    metrics::set_peers_active(peers);

    match render(stats) {
        Some(block) => info!(
            target: "biz.tasks.stat",
            rooms = stats.len(),
            peers,
            "\n{block}"
        ),
        None => debug!(target: "biz.tasks.stat", "No active rooms"),
    }
}

/// One `room: {sid} peers: {n}` line per non-empty room, or `None` if there
/// are none.
fn render(stats: &[RoomStats]) -> Option<String> {
    let mut block = String::new();
    for room in stats.iter().filter(|s| s.peers > 0) {
        let _ = writeln!(block, "room: {} peers: {}", room.sid, room.peers);
    }
    (!block.is_empty()).then_some(block)
}
