//! Client-facing signaling service (`biz.Biz`).
//!
//! A client opens one bidirectional `Signal` stream and sends
//! [`SignalRequest`]s over it. The node answers `Join` and `Leave` with a
//! reply and pushes relayed chat messages and stream events as they occur.

tonic::include_proto!("biz");

impl SignalReply {
    pub fn join(success: bool, reason: impl Into<String>) -> Self {
        Self {
            payload: Some(signal_reply::Payload::JoinReply(JoinReply {
                success,
                reason: reason.into(),
            })),
        }
    }

    pub fn leave(reason: impl Into<String>) -> Self {
        Self {
            payload: Some(signal_reply::Payload::LeaveReply(LeaveReply {
                reason: reason.into(),
            })),
        }
    }

    pub fn msg(msg: super::ion::Message) -> Self {
        Self {
            payload: Some(signal_reply::Payload::Msg(msg)),
        }
    }

    pub fn stream_event(event: super::ion::StreamEvent) -> Self {
        Self {
            payload: Some(signal_reply::Payload::StreamEvent(event)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn test_msg_uses_oneof_tag_three() {
        // field 3 (msg) wrapping ion.Message { from: "a" }
        let bytes = [0x1a, 0x03, 0x0a, 0x01, b'a'];
        let request = SignalRequest::decode(bytes.as_slice()).unwrap();
        assert!(matches!(
            request.payload,
            Some(signal_request::Payload::Msg(ref m)) if m.from == "a"
        ));
    }

    #[test]
    fn test_join_reply_constructor() {
        let reply = SignalReply::join(false, "no room");
        assert!(matches!(
            reply.payload,
            Some(signal_reply::Payload::JoinReply(JoinReply { success: false, ref reason })) if reason == "no room"
        ));
    }
}
