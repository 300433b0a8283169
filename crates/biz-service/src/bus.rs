//! Node addressing for the biz node.
//!
//! The biz node never talks to other nodes by address directly: it asks a
//! [`NodeDirectory`] for the current neighbor set and for a client bound to
//! a chosen node. [`StaticNodeDirectory`] serves both from configuration,
//! with each neighbor reachable at its own gRPC endpoint.

use crate::errors::BizError;
use crate::grpc::islb_client::{GrpcIslbClient, IslbApi};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// A neighbor node and the service types it advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub node_id: String,
    pub services: Vec<String>,
    pub endpoint: String,
}

impl NodeDescriptor {
    /// Whether this node advertises `service`.
    pub fn provides(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }
}

/// Parses `node_id=service[+service...]@endpoint`.
impl FromStr for NodeDescriptor {
    type Err = String;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let entry = entry.trim();
        let (node_id, rest) = entry
            .split_once('=')
            .ok_or_else(|| format!("neighbor entry '{entry}' is missing '='"))?;
        let (services, endpoint) = rest
            .split_once('@')
            .ok_or_else(|| format!("neighbor entry '{entry}' is missing '@endpoint'"))?;

        let node_id = node_id.trim();
        let endpoint = endpoint.trim();
        if node_id.is_empty() {
            return Err(format!("neighbor entry '{entry}' has an empty node id"));
        }
        if endpoint.is_empty() {
            return Err(format!("neighbor entry '{entry}' has an empty endpoint"));
        }

        let services: Vec<String> = services
            .split('+')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if services.is_empty() {
            return Err(format!("neighbor entry '{entry}' advertises no service"));
        }

        Ok(Self {
            node_id: node_id.to_string(),
            services,
            endpoint: endpoint.to_string(),
        })
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}@{}",
            self.node_id,
            self.services.join("+"),
            self.endpoint
        )
    }
}

/// Directory of neighbor nodes, plus client construction for them.
pub trait NodeDirectory: Send + Sync {
    /// Current neighbor set.
    fn neighbor_nodes(&self) -> Vec<NodeDescriptor>;

    /// Build a session-location client bound to `node`.
    ///
    /// # Errors
    ///
    /// Returns `BizError::Config` if the node's endpoint is unusable.
    fn islb_client(&self, node: &NodeDescriptor) -> Result<Arc<dyn IslbApi>, BizError>;
}

/// Neighbor directory loaded once from configuration.
#[derive(Debug, Clone)]
pub struct StaticNodeDirectory {
    neighbors: Vec<NodeDescriptor>,
    rpc_timeout: Duration,
}

impl StaticNodeDirectory {
    #[must_use]
    pub fn new(neighbors: Vec<NodeDescriptor>, rpc_timeout: Duration) -> Self {
        Self {
            neighbors,
            rpc_timeout,
        }
    }
}

impl NodeDirectory for StaticNodeDirectory {
    fn neighbor_nodes(&self) -> Vec<NodeDescriptor> {
        self.neighbors.clone()
    }

    fn islb_client(&self, node: &NodeDescriptor) -> Result<Arc<dyn IslbApi>, BizError> {
        let client = GrpcIslbClient::connect_lazy(&node.endpoint, self.rpc_timeout)?;
        Ok(Arc::new(client))
    }
}
