//! Messages shared across Ion node types.

tonic::include_proto!("ion");

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn test_stream_event_state_accessor() {
        let mut event = StreamEvent {
            sid: "room-1".to_string(),
            uid: "alice".to_string(),
            ..Default::default()
        };
        assert_eq!(event.state(), stream_event::State::Add);

        event.set_state(stream_event::State::Remove);
        assert_eq!(event.state, 1);
        assert_eq!(event.state().as_str_name(), "REMOVE");
    }

    #[test]
    fn test_unknown_state_falls_back_to_default() {
        let event = StreamEvent {
            state: 42,
            ..Default::default()
        };
        assert_eq!(event.state(), stream_event::State::Add);
    }

    #[test]
    fn test_peer_info_is_opaque_bytes() {
        let peer = Peer {
            sid: "room-1".to_string(),
            uid: "bob".to_string(),
            info: vec![0xff, 0x00, 0x7f],
        };

        let decoded = Peer::decode(peer.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.info, vec![0xff, 0x00, 0x7f]);
    }
}
