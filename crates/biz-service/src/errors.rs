//! Biz node error types.
//!
//! Errors never terminate the process once it is serving. Join failures are
//! reported to the client as a human-readable `JoinReply.reason`; transport
//! failures are logged server-side and otherwise swallowed.

use proto_gen::SERVICE_SFU;
use thiserror::Error;

/// Biz node error type.
#[derive(Debug, Error)]
pub enum BizError {
    /// No neighbor advertises the session-location service.
    #[error("islb node not found")]
    IslbNotFound,

    /// Session-location answered, but with no node for the room.
    #[error("no {service} node for sid = {sid}")]
    NodeNotFound { service: String, sid: String },

    /// gRPC communication error (biz <-> ISLB), including timeouts.
    #[error("gRPC error: {0}")]
    Grpc(String),

    /// The topology event stream has ended and is not reopened.
    #[error("topology subscription closed")]
    SubscriptionClosed,

    /// The signaling stream is already bound to a room.
    #[error("already joined sid = {sid} as uid = {uid}")]
    AlreadyJoined { sid: String, uid: String },

    /// Configuration error (bad neighbor endpoint and the like).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (channel failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BizError {
    /// Returns the `JoinReply.reason` sent to a client whose join for `sid`
    /// failed with this error.
    pub fn join_reason(&self, sid: &str) -> String {
        match self {
            BizError::IslbNotFound => format!("join [sid={sid}] islb node not found"),
            BizError::NodeNotFound { .. } | BizError::Grpc(_) => {
                format!("find node (service = {SERVICE_SFU}, sid = {sid}) failed: {self}")
            }
            BizError::AlreadyJoined { .. } => format!("join [sid={sid}] {self}"),
            BizError::SubscriptionClosed | BizError::Config(_) | BizError::Internal(_) => {
                format!("join [sid={sid}] unknown error.")
            }
        }
    }

    /// Bounded label for the `biz_join_total` outcome metric.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            BizError::IslbNotFound => "islb_not_found",
            BizError::NodeNotFound { .. } => "node_not_found",
            BizError::Grpc(_) => "rpc_error",
            BizError::AlreadyJoined { .. } => "already_joined",
            BizError::SubscriptionClosed | BizError::Config(_) | BizError::Internal(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_islb_not_found_reason() {
        let err = BizError::IslbNotFound;
        assert_eq!(err.join_reason("room-1"), "join [sid=room-1] islb node not found");
        assert_eq!(err.outcome_label(), "islb_not_found");
    }

    #[test]
    fn test_find_node_failure_reasons_name_the_service() {
        let err = BizError::NodeNotFound {
            service: "sfu".to_string(),
            sid: "room-1".to_string(),
        };
        assert_eq!(
            err.join_reason("room-1"),
            "find node (service = sfu, sid = room-1) failed: no sfu node for sid = room-1"
        );

        let err = BizError::Grpc("connection refused".to_string());
        let reason = err.join_reason("room-2");
        assert!(reason.starts_with("find node (service = sfu, sid = room-2) failed"));
        assert!(reason.contains("connection refused"));
        assert_eq!(err.outcome_label(), "rpc_error");
    }

    #[test]
    fn test_already_joined_reason() {
        let err = BizError::AlreadyJoined {
            sid: "room-1".to_string(),
            uid: "alice".to_string(),
        };
        assert_eq!(
            err.join_reason("room-2"),
            "join [sid=room-2] already joined sid = room-1 as uid = alice"
        );
    }

    #[test]
    fn test_internal_errors_are_opaque_to_clients() {
        let err = BizError::Internal("mailbox closed".to_string());
        let reason = err.join_reason("room-1");
        assert!(!reason.contains("mailbox"));
        assert_eq!(err.outcome_label(), "error");
    }
}
