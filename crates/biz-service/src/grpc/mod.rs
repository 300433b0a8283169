//! gRPC surfaces of the biz node.
//!
//! ```text
//! client --Signal--> BizSignalService --> SignalSession
//! SignalSession --FindNode--> ISLB        (islb_client, via locator)
//! ISLB --WatchEvent--> TopologyWatcher --> rooms
//! ```

pub mod biz_service;
pub mod islb_client;
pub mod locator;
pub mod watcher;

pub use biz_service::BizSignalService;
pub use islb_client::{GrpcIslbClient, IslbApi, IslbEventStream};
pub use locator::ServiceLocator;
pub use watcher::TopologyWatcher;
