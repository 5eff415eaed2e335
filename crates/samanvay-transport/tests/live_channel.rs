use std::net::SocketAddr;
use std::time::Duration;

use samanvay_io::{IoError, MessageEnvelope, MessageSink, MessageSource};
use samanvay_net::read_line_frame;
use samanvay_transport::{spawn_live_channel, LiveEventSource, ReconnectPolicy, TransportConfig};
use samanvay_wire::{decode_outbound, LiveEvent, OutboundEvent};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

fn fast_config(live_addr: SocketAddr) -> TransportConfig {
    TransportConfig {
        live_addr,
        connect_timeout: Duration::from_millis(500),
        reconnect_policy: ReconnectPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            jitter: 0.0,
            ..ReconnectPolicy::default()
        },
        ..TransportConfig::default()
    }
}

async fn next_envelope(events: &mut LiveEventSource) -> MessageEnvelope<LiveEvent> {
    timeout(STEP, events.recv())
        .await
        .expect("event should arrive in time")
        .expect("event source should be open")
}

async fn next_event(events: &mut LiveEventSource) -> LiveEvent {
    next_envelope(events).await.message
}

async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should work");
    listener.local_addr().expect("local addr")
}

#[tokio::test]
async fn lifecycle_events_bracket_inbound_traffic_and_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should work");
    let mut channel =
        spawn_live_channel(fast_config(listener.local_addr().expect("addr"))).expect("spawn");

    let (mut server, _) = timeout(STEP, listener.accept())
        .await
        .expect("accept in time")
        .expect("accept should work");
    let connected = next_envelope(&mut channel.events).await;
    assert_eq!(connected.message, LiveEvent::Connect);
    assert_eq!(connected.sequence, 0);

    server
        .write_all(b"{\"event\":\"message\",\"data\":{\"sid\":\"hq\",\"text\":\"hold\"}}\n")
        .await
        .expect("write should work");
    let message = next_envelope(&mut channel.events).await;
    assert_eq!(
        message.message,
        LiveEvent::Message {
            sender_id: "hq".to_owned(),
            text: "hold".to_owned()
        }
    );
    assert_eq!(message.sequence, 1);

    drop(server);
    assert_eq!(next_event(&mut channel.events).await, LiveEvent::Disconnect);

    let (_server, _) = timeout(STEP, listener.accept())
        .await
        .expect("redial in time")
        .expect("accept should work");
    assert_eq!(next_event(&mut channel.events).await, LiveEvent::Connect);

    channel.supervisor.shutdown().await;
    assert_eq!(next_event(&mut channel.events).await, LiveEvent::Disconnect);
}

#[tokio::test]
async fn outbound_events_reach_the_peer_as_frames() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should work");
    let mut channel =
        spawn_live_channel(fast_config(listener.local_addr().expect("addr"))).expect("spawn");

    let (server, _) = timeout(STEP, listener.accept())
        .await
        .expect("accept in time")
        .expect("accept should work");
    assert_eq!(next_event(&mut channel.events).await, LiveEvent::Connect);

    let sink: &dyn MessageSink<OutboundEvent> = &channel.handle;
    timeout(
        STEP,
        sink.send(OutboundEvent::Message {
            text: "convoy moving".to_owned(),
        }),
    )
    .await
    .expect("send in time")
    .expect("send should succeed");

    let mut server = BufReader::new(server);
    let frame = read_line_frame(&mut server, 1024)
        .await
        .expect("frame should read")
        .expect("frame present");
    assert_eq!(
        decode_outbound(&frame).expect("frame should decode"),
        OutboundEvent::Message {
            text: "convoy moving".to_owned()
        }
    );

    channel.supervisor.shutdown().await;
}

#[tokio::test]
async fn sends_fail_fast_while_the_channel_is_down() {
    let channel = spawn_live_channel(fast_config(unused_addr().await)).expect("spawn");

    let error = timeout(
        STEP,
        channel.handle.send(OutboundEvent::Message {
            text: "anyone?".to_owned(),
        }),
    )
    .await
    .expect("send should resolve")
    .expect_err("send should fail while down");
    assert!(matches!(error, IoError::Closed));

    channel.supervisor.shutdown().await;
}

#[tokio::test]
async fn exhausted_retry_budget_closes_the_event_source() {
    let mut config = fast_config(unused_addr().await);
    config.reconnect_policy.max_retries = Some(1);
    let mut channel = spawn_live_channel(config).expect("spawn");

    let closed = timeout(STEP, channel.events.recv())
        .await
        .expect("source should close in time");
    assert!(matches!(closed, Err(IoError::Closed)));
    timeout(STEP, channel.supervisor.shutdown())
        .await
        .expect("supervisor should already be done");
}

#[tokio::test]
async fn invalid_config_is_rejected_before_spawning() {
    let config = TransportConfig {
        max_frame_bytes: 0,
        ..TransportConfig::default()
    };
    assert!(spawn_live_channel(config).is_err());
}
