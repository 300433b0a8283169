//! Signal request builders.

use proto_gen::biz::signal_request::Payload;
use proto_gen::biz::{Join, Leave, SignalRequest};
use proto_gen::ion::{self, stream_event, StreamEvent};
use proto_gen::islb::{islb_event, IslbEvent};

/// Join `sid` as `uid` with no peer info.
pub fn join_request(sid: &str, uid: &str) -> SignalRequest {
    join_request_with_info(sid, uid, &[])
}

pub fn join_request_with_info(sid: &str, uid: &str, info: &[u8]) -> SignalRequest {
    SignalRequest {
        payload: Some(Payload::Join(Join {
            peer: Some(ion::Peer {
                sid: sid.to_string(),
                uid: uid.to_string(),
                info: info.to_vec(),
            }),
        })),
    }
}

pub fn leave_request(uid: &str) -> SignalRequest {
    SignalRequest {
        payload: Some(Payload::Leave(Leave {
            uid: uid.to_string(),
        })),
    }
}

/// Broadcast chat message `data` from `from`.
pub fn msg_request(from: &str, data: &str) -> SignalRequest {
    SignalRequest {
        payload: Some(Payload::Msg(ion::Message {
            from: from.to_string(),
            to: String::new(),
            data: data.as_bytes().to_vec(),
        })),
    }
}

/// A stream `Add` event for `uid` in room `sid`, as ISLB pushes it.
pub fn stream_added(sid: &str, uid: &str, stream_id: &str) -> IslbEvent {
    IslbEvent {
        payload: Some(islb_event::Payload::Stream(StreamEvent {
            state: stream_event::State::Add.into(),
            sid: sid.to_string(),
            uid: uid.to_string(),
            streams: vec![ion::Stream {
                id: stream_id.to_string(),
                tracks: vec![ion::Track {
                    id: format!("{stream_id}-audio"),
                    label: "audio".to_string(),
                    kind: "audio".to_string(),
                }],
            }],
        })),
    }
}
