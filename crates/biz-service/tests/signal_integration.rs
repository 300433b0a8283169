//! End-to-end signaling tests: real Biz gRPC service against a mock ISLB.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use biz_service::signal::{JOIN_SUCCESS_REASON, LEAVE_REASON};
use biz_test_utils::{
    join_request, join_request_with_info, leave_request, msg_request, stream_added,
    MockIslbServer, TestBizServer,
};
use proto_gen::ion::stream_event::State;
use tokio::sync::mpsc;
use tonic::Status;

/// Poll `check` until it holds or a second passes.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_join_creates_room_routed_to_sfu() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice
        .send(join_request_with_info("room-1", "alice", b"{\"name\":\"Alice\"}"))
        .await;
    let reply = alice.recv_join().await;

    assert!(reply.success);
    assert_eq!(reply.reason, JOIN_SUCCESS_REASON);

    let room = server.node().registry().get("room-1").await.unwrap();
    assert_eq!(room.routing_node_id(), "sfu-1");
    assert_eq!(room.get_peer("alice").await.unwrap().info(), b"{\"name\":\"Alice\"}");

    let requests = islb.find_node_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service, "sfu");
    assert_eq!(requests[0].sid, "room-1");
    Ok(())
}

#[tokio::test]
async fn test_second_join_reuses_room_without_find_node() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);

    let mut bob = server.connect().await?;
    bob.send(join_request("room-1", "bob")).await;
    assert!(bob.recv_join().await.success);

    assert_eq!(islb.find_node_count(), 1);
    assert_eq!(islb.watch_count(), 1);
    let room = server.node().registry().get("room-1").await.unwrap();
    assert_eq!(room.count().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_join_without_islb_neighbor_fails() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn(&format!("sfu-1=sfu@{}", islb.endpoint())).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    let reply = alice.recv_join().await;

    assert!(!reply.success);
    assert_eq!(reply.reason, "join [sid=room-1] islb node not found");
    assert_eq!(islb.find_node_count(), 0);
    assert_eq!(server.node().registry().count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_join_with_no_sfu_node_creates_no_room() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::without_nodes().start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    let reply = alice.recv_join().await;

    assert!(!reply.success);
    assert!(
        reply
            .reason
            .starts_with("find node (service = sfu, sid = room-1) failed"),
        "unexpected reason: {}",
        reply.reason
    );
    assert!(server.node().registry().get("room-1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_join_with_failing_islb() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::failing().start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    let reply = alice.recv_join().await;

    assert!(!reply.success);
    assert!(reply.reason.contains("find node (service = sfu, sid = room-1) failed"));
    assert_eq!(islb.find_node_count(), 1);
    assert_eq!(server.node().registry().count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_chat_is_relayed_and_last_five_kept() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);
    let mut bob = server.connect().await?;
    bob.send(join_request("room-1", "bob")).await;
    assert!(bob.recv_join().await.success);

    for i in 1..=6 {
        alice.send(msg_request("alice", &format!("m{i}"))).await;
    }
    for i in 1..=6 {
        let msg = bob.recv_msg().await;
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.data, format!("m{i}").into_bytes());
    }
    alice.assert_silent().await;

    let room = server.node().registry().get("room-1").await.unwrap();
    let history: Vec<String> = room
        .chat_history()
        .await
        .entries()
        .into_iter()
        .map(|e| e.data)
        .collect();
    assert_eq!(history, vec!["m2", "m3", "m4", "m5", "m6"]);
    Ok(())
}

#[tokio::test]
async fn test_message_before_join_has_no_effect() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(msg_request("alice", "hello?")).await;
    alice.assert_silent().await;
    assert_eq!(server.node().registry().count().await, 0);
    assert_eq!(islb.find_node_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_leave_for_other_uid_gets_no_reply() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);

    alice.send(leave_request("bob")).await;
    alice.assert_silent().await;
    assert!(server.node().registry().get("room-1").await.is_some());

    alice.send(leave_request("alice")).await;
    assert_eq!(alice.recv_leave().await.reason, LEAVE_REASON);
    assert!(server.node().registry().get("room-1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_room_deleted_after_both_peers_leave() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);
    let mut bob = server.connect().await?;
    bob.send(join_request("room-1", "bob")).await;
    assert!(bob.recv_join().await.success);

    alice.send(leave_request("alice")).await;
    alice.recv_leave().await;
    let room = server.node().registry().get("room-1").await.unwrap();
    assert_eq!(room.count().await, 1);
    assert_eq!(room.info().await.host.unwrap().uid(), "bob");

    bob.send(leave_request("bob")).await;
    bob.recv_leave().await;
    assert!(server.node().registry().get("room-1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_disconnect_removes_peer() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);

    alice.close().await;

    let registry = server.node().registry();
    eventually(move || async move { registry.get("room-1").await.is_none() }).await;
    Ok(())
}

#[tokio::test]
async fn test_stream_event_reaches_room_peers() -> Result<(), anyhow::Error> {
    let (watch_tx, mut watch_rx) = mpsc::channel(8);
    let islb = MockIslbServer::with_sfu("sfu-1")
        .with_watch_request_channel(watch_tx)
        .start()
        .await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);
    let mut bob = server.connect().await?;
    bob.send(join_request("room-1", "bob")).await;
    assert!(bob.recv_join().await.success);

    let watch = tokio::time::timeout(Duration::from_secs(1), watch_rx.recv())
        .await?
        .unwrap();
    assert_eq!(watch.nid, "sfu-1");
    assert_eq!(watch.sid, "room-1");

    assert_eq!(islb.push_event(stream_added("room-1", "alice", "s1")).await, 1);

    for client in [&mut alice, &mut bob] {
        let event = client.recv_stream_event().await;
        assert_eq!(event.uid, "alice");
        assert_eq!(event.state(), State::Add);
        assert_eq!(event.streams[0].id, "s1");
    }

    let room = server.node().registry().get("room-1").await.unwrap();
    let cached = room
        .get_peer("alice")
        .await
        .unwrap()
        .last_stream_event()
        .await
        .unwrap();
    assert_eq!(cached.streams[0].id, "s1");
    Ok(())
}

#[tokio::test]
async fn test_new_rooms_reuse_the_open_watch_stream() -> Result<(), anyhow::Error> {
    let (watch_tx, mut watch_rx) = mpsc::channel(8);
    let islb = MockIslbServer::with_sfu("sfu-1")
        .with_watch_request_channel(watch_tx)
        .start()
        .await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);
    let mut carol = server.connect().await?;
    carol.send(join_request("room-2", "carol")).await;
    assert!(carol.recv_join().await.success);

    let mut sids = Vec::new();
    for _ in 0..2 {
        let watch = tokio::time::timeout(Duration::from_secs(1), watch_rx.recv())
            .await?
            .unwrap();
        sids.push(watch.sid);
    }
    sids.sort();
    assert_eq!(sids, vec!["room-1", "room-2"]);
    assert_eq!(islb.watch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_join_still_succeeds_after_watch_stream_fails() -> Result<(), anyhow::Error> {
    let islb = MockIslbServer::with_sfu("sfu-1").start().await;
    let server = TestBizServer::spawn_with_islb(islb.addr()).await?;

    let mut alice = server.connect().await?;
    alice.send(join_request("room-1", "alice")).await;
    assert!(alice.recv_join().await.success);

    islb.fail_watchers(Status::unavailable("islb restarting")).await;
    let watcher = server.node().watcher();
    eventually(move || async move { !watcher.is_active().await }).await;

    let mut carol = server.connect().await?;
    carol.send(join_request("room-2", "carol")).await;
    let reply = carol.recv_join().await;
    assert!(reply.success, "watch failure must not fail the join");
    assert_eq!(islb.watch_count(), 1, "no reconnection is attempted");
    Ok(())
}
