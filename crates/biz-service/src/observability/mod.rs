//! Observability for the biz node.
//!
//! Metric labels are bounded:
//! - `request_type`: join, leave, msg
//! - `outcome`: join outcomes from `BizError::outcome_label`, or routed/no_room
//! - `reason`: mailbox_full, mailbox_closed
//! - `operation`: find_node, watch_event
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `biz_rooms_active` | Gauge | none |
//! | `biz_peers_active` | Gauge | none |
//! | `biz_signal_requests_total` | Counter | `request_type` |
//! | `biz_join_total` | Counter | `outcome` |
//! | `biz_messages_dropped_total` | Counter | `reason` |
//! | `biz_topology_events_total` | Counter | `outcome` |
//! | `biz_islb_rpc_duration_seconds` | Histogram | `operation` |

pub mod health;
pub mod metrics;
pub mod rooms;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
pub use rooms::rooms_router;
