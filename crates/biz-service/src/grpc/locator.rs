//! Lazy, one-time discovery of the session-location (ISLB) client.
//!
//! The first join scans the neighbor set for a node advertising `"islb"`
//! and binds a client to the first match. A failed scan leaves nothing
//! cached and is retried by the next join; a successful one is kept for the
//! node's lifetime. Concurrent first joins share one scan.

use crate::bus::NodeDirectory;
use crate::errors::BizError;
use crate::grpc::islb_client::IslbApi;
use proto_gen::SERVICE_ISLB;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub struct ServiceLocator {
    directory: Arc<dyn NodeDirectory>,
    islb: OnceCell<Arc<dyn IslbApi>>,
}

impl ServiceLocator {
    pub fn new(directory: Arc<dyn NodeDirectory>) -> Self {
        Self {
            directory,
            islb: OnceCell::new(),
        }
    }

    /// The ISLB client, discovering it on first use.
    ///
    /// Returns `None` when no neighbor advertises the service.
    pub async fn islb(&self) -> Option<Arc<dyn IslbApi>> {
        match self
            .islb
            .get_or_try_init(|| async { self.discover() })
            .await
        {
            Ok(client) => Some(Arc::clone(client)),
            Err(e) => {
                warn!(
                    target: "biz.grpc.locator",
                    error = %e,
                    "ISLB discovery failed, will retry on next join"
                );
                None
            }
        }
    }

    fn discover(&self) -> Result<Arc<dyn IslbApi>, BizError> {
        let node = self
            .directory
            .neighbor_nodes()
            .into_iter()
            .find(|n| n.provides(SERVICE_ISLB))
            .ok_or(BizError::IslbNotFound)?;

        let client = self.directory.islb_client(&node)?;
        info!(
            target: "biz.grpc.locator",
            node_id = %node.node_id,
            endpoint = %node.endpoint,
            "ISLB client bound"
        );
        Ok(client)
    }
}
