//! Biz node configuration.
//!
//! Configuration is loaded from environment variables. Every setting has a
//! default, so an empty environment yields a node that serves signaling but
//! cannot locate an ISLB (joins fail with "islb node not found").

use crate::bus::NodeDescriptor;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default gRPC bind address for client signaling.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:5551";

/// Default HTTP bind address (room introspection, health, metrics).
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:3095";

/// Default timeout for ISLB RPCs in seconds.
pub const DEFAULT_ISLB_RPC_TIMEOUT_SECONDS: u64 = 10;

/// Default period of the occupancy stat task in seconds.
pub const DEFAULT_STAT_INTERVAL_SECONDS: u64 = 3;

/// Default capacity of each peer's outbound mailbox.
pub const DEFAULT_PEER_MAILBOX_CAPACITY: usize = 64;

/// Default biz node ID prefix.
pub const DEFAULT_NODE_ID_PREFIX: &str = "biz";

/// Biz node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this biz node.
    pub node_id: String,

    /// gRPC server bind address for client signaling (default: "0.0.0.0:5551").
    pub grpc_bind_address: String,

    /// HTTP bind address for introspection, health and metrics (default: "0.0.0.0:3095").
    pub http_bind_address: String,

    /// Neighbor nodes, parsed from `BIZ_NEIGHBORS`.
    pub neighbors: Vec<NodeDescriptor>,

    /// Bound on each ISLB RPC (default: 10s).
    pub islb_rpc_timeout_seconds: u64,

    /// Period of the occupancy stat task (default: 3s).
    pub stat_interval_seconds: u64,

    /// Capacity of each peer's outbound mailbox (default: 64).
    pub peer_mailbox_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let grpc_bind_address = vars
            .get("BIZ_GRPC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRPC_BIND_ADDRESS.to_string());

        let http_bind_address = vars
            .get("BIZ_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let neighbors = match vars.get("BIZ_NEIGHBORS") {
            Some(raw) => parse_neighbors(raw)?,
            None => Vec::new(),
        };

        let islb_rpc_timeout_seconds = vars
            .get("BIZ_ISLB_RPC_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ISLB_RPC_TIMEOUT_SECONDS);
        if islb_rpc_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "BIZ_ISLB_RPC_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        let stat_interval_seconds = vars
            .get("BIZ_STAT_INTERVAL_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STAT_INTERVAL_SECONDS);
        if stat_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "BIZ_STAT_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        let peer_mailbox_capacity = vars
            .get("BIZ_PEER_MAILBOX_CAPACITY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PEER_MAILBOX_CAPACITY);
        if peer_mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "BIZ_PEER_MAILBOX_CAPACITY must be greater than zero".to_string(),
            ));
        }

        // Generate node ID
        let node_id = vars.get("BIZ_NODE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_NODE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            node_id,
            grpc_bind_address,
            http_bind_address,
            neighbors,
            islb_rpc_timeout_seconds,
            stat_interval_seconds,
            peer_mailbox_capacity,
        })
    }

    pub fn islb_rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.islb_rpc_timeout_seconds)
    }

    pub fn stat_interval(&self) -> Duration {
        Duration::from_secs(self.stat_interval_seconds)
    }
}

/// Parse a comma separated `node_id=service[+service]@endpoint` list.
fn parse_neighbors(raw: &str) -> Result<Vec<NodeDescriptor>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<NodeDescriptor>()
                .map_err(|e| ConfigError::InvalidValue(format!("BIZ_NEIGHBORS: {e}")))
        })
        .collect()
}
