//! # Biz Test Utilities
//!
//! Shared test utilities for the biz node.
//!
//! - `mock_islb` - in-process ISLB gRPC server with scripted nodes and
//!   injectable topology events
//! - `server_harness` - `TestBizServer`, the real Biz gRPC service on an
//!   ephemeral port
//! - `signal_client` - `TestSignalClient`, one open `Signal` stream
//! - `fixtures` - signal request builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use biz_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let islb = MockIslbServer::with_sfu("sfu-1").start().await;
//!     let server = TestBizServer::spawn_with_islb(islb.addr()).await?;
//!
//!     let mut alice = server.connect().await?;
//!     alice.send(join_request("room-1", "alice")).await;
//!     assert!(alice.recv_join().await.success);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod mock_islb;
pub mod server_harness;
pub mod signal_client;

pub use fixtures::*;
pub use mock_islb::*;
pub use server_harness::*;
pub use signal_client::*;
