// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Replays the literal end-to-end scenarios against a real `mqttd`
//! subprocess over TCP, using the harness's own test client rather than
//! the in-memory transport `broker/tests` exercises. Each test picks its
//! own port so the suite can run with the default parallel test runner.
//!
//! `will_delivery_on_keep_alive_timeout` carries a real multi-second sleep
//! since the connection's keep-alive deadline is driven by the wall clock.

mod common;

use codec::{v3, QoS};
use common::Server;
use mqttd_harness::MqttTestClient;

fn connect_packet(client_id: &str, clean_session: bool) -> v3::Packet {
    v3::Packet::Connect(v3::ConnectPacket {
        protocol_level: codec::ProtocolLevel::V311,
        clean_session,
        keep_alive: 60,
        client_id: client_id.to_string(),
        will: None,
        username: None,
        password: None,
    })
}

fn connect_packet_with_will(
    client_id: &str,
    keep_alive: u16,
    will_topic: &str,
    will_payload: &[u8],
    will_qos: QoS,
) -> v3::Packet {
    v3::Packet::Connect(v3::ConnectPacket {
        protocol_level: codec::ProtocolLevel::V311,
        clean_session: true,
        keep_alive,
        client_id: client_id.to_string(),
        will: Some(v3::LastWill {
            topic: will_topic.to_string(),
            message: will_payload.to_vec(),
            qos: will_qos,
            retain: false,
        }),
        username: None,
        password: None,
    })
}

#[tokio::test]
async fn basic_qos2_round_trip() {
    let server = Server::start(18_930);
    let addr = "127.0.0.1:18930";

    let mut client = MqttTestClient::connect(addr).await.expect("connect");
    client.send(&connect_packet("myclientid", true)).await.unwrap();
    let ack = client.recv().await.unwrap();
    assert!(matches!(
        ack,
        v3::Packet::ConnectAck(v3::ConnectAckPacket {
            return_code: v3::ConnectReturnCode::Accepted,
            ..
        })
    ));

    client
        .send(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA".to_string(),
                qos: QoS::ExactlyOnce,
            }],
        }))
        .await
        .unwrap();
    let suback = client.recv().await.unwrap();
    assert!(matches!(suback, v3::Packet::SubscribeAck(_)));

    client
        .send(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::ExactlyOnce,
            retain: false,
            topic: "TopicA".to_string(),
            packet_id: Some(42),
            payload: b"qos 2".to_vec(),
        }))
        .await
        .unwrap();
    let pubrec = client.recv().await.unwrap();
    assert!(matches!(pubrec, v3::Packet::PublishReceived(_)));

    client
        .send(&v3::Packet::PublishRelease(v3::PublishReleasePacket {
            packet_id: 42,
        }))
        .await
        .unwrap();
    let pubcomp = client.recv().await.unwrap();
    assert!(matches!(pubcomp, v3::Packet::PublishComplete(_)));

    let delivered = client.recv().await.unwrap();
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "TopicA");
            assert_eq!(p.payload, b"qos 2");
        }
        other => panic!("expected Publish, got {:?}", other),
    }

    drop(server);
}

#[tokio::test]
async fn retained_propagation_and_clear() {
    let server = Server::start(18_931);
    let addr = "127.0.0.1:18931";

    let mut publisher = MqttTestClient::connect(addr).await.expect("connect");
    publisher.send(&connect_packet("pub1", true)).await.unwrap();
    let _ = publisher.recv().await.unwrap();

    publisher
        .send(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic: "TopicA/B".to_string(),
            packet_id: None,
            payload: b"payload".to_vec(),
        }))
        .await
        .unwrap();

    let mut subscriber = MqttTestClient::connect(addr).await.expect("connect");
    subscriber.send(&connect_packet("sub1", true)).await.unwrap();
    let _ = subscriber.recv().await.unwrap();
    subscriber
        .send(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA/#".to_string(),
                qos: QoS::AtMostOnce,
            }],
        }))
        .await
        .unwrap();
    let _suback = subscriber.recv().await.unwrap();
    let retained = subscriber.recv().await.unwrap();
    match retained {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "TopicA/B");
            assert!(p.retain);
        }
        other => panic!("expected retained Publish, got {:?}", other),
    }

    // Empty-payload publish erases the retained message.
    publisher
        .send(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic: "TopicA/B".to_string(),
            packet_id: None,
            payload: Vec::new(),
        }))
        .await
        .unwrap();

    let mut subscriber2 = MqttTestClient::connect(addr).await.expect("connect");
    subscriber2.send(&connect_packet("sub2", true)).await.unwrap();
    let _ = subscriber2.recv().await.unwrap();
    subscriber2
        .send(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA/#".to_string(),
                qos: QoS::AtMostOnce,
            }],
        }))
        .await
        .unwrap();
    let suback2 = subscriber2.recv().await.unwrap();
    assert!(matches!(suback2, v3::Packet::SubscribeAck(_)));

    // Nothing retained remains, so the next thing delivered is a live
    // publish, not a stale replay.
    publisher
        .send(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: "TopicA/D".to_string(),
            packet_id: None,
            payload: b"live".to_vec(),
        }))
        .await
        .unwrap();
    let next = subscriber2.recv().await.unwrap();
    match next {
        v3::Packet::Publish(p) => assert_eq!(p.topic, "TopicA/D"),
        other => panic!("expected Publish, got {:?}", other),
    }

    drop(server);
}

#[tokio::test]
async fn offline_queueing_and_session_present() {
    let server = Server::start(18_932);
    let addr = "127.0.0.1:18932";

    let mut a = MqttTestClient::connect(addr).await.expect("connect");
    a.send(&connect_packet("A", false)).await.unwrap();
    let _ = a.recv().await.unwrap();
    a.send(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "fromb/#".to_string(),
            qos: QoS::AtLeastOnce,
        }],
    }))
    .await
    .unwrap();
    let _ = a.recv().await.unwrap();
    a.send(&v3::Packet::Disconnect(v3::DisconnectPacket)).await.unwrap();
    drop(a);

    let mut b = MqttTestClient::connect(addr).await.expect("connect");
    b.send(&connect_packet("B", true)).await.unwrap();
    let _ = b.recv().await.unwrap();
    b.send(&v3::Packet::Publish(v3::PublishPacket {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: "fromb/qos1".to_string(),
        packet_id: Some(1),
        payload: b"qos 1".to_vec(),
    }))
    .await
    .unwrap();
    let _ = b.recv().await.unwrap();
    b.send(&v3::Packet::Disconnect(v3::DisconnectPacket)).await.unwrap();
    drop(b);

    let mut a2 = MqttTestClient::connect(addr).await.expect("connect");
    a2.send(&connect_packet("A", false)).await.unwrap();
    let ack = a2.recv().await.unwrap();
    match ack {
        v3::Packet::ConnectAck(ack) => assert!(ack.session_present),
        other => panic!("expected ConnectAck, got {:?}", other),
    }

    let delivered = a2.recv().await.unwrap();
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "fromb/qos1");
            assert_eq!(p.payload, b"qos 1");
        }
        other => panic!("expected queued Publish, got {:?}", other),
    }

    drop(server);
}

#[tokio::test]
async fn redelivery_on_reconnect_with_dup() {
    let server = Server::start(18_933);
    let addr = "127.0.0.1:18933";

    let mut a = MqttTestClient::connect(addr).await.expect("connect");
    a.send(&connect_packet("A", false)).await.unwrap();
    let _ = a.recv().await.unwrap();
    a.send(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "fromb/#".to_string(),
            qos: QoS::AtLeastOnce,
        }],
    }))
    .await
    .unwrap();
    let _ = a.recv().await.unwrap();

    let mut b = MqttTestClient::connect(addr).await.expect("connect");
    b.send(&connect_packet("B", true)).await.unwrap();
    let _ = b.recv().await.unwrap();
    b.send(&v3::Packet::Publish(v3::PublishPacket {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: "fromb/qos1".to_string(),
        packet_id: Some(1),
        payload: b"qos 1".to_vec(),
    }))
    .await
    .unwrap();
    let _ = b.recv().await.unwrap();

    // A gets the live copy but drops the connection before it PUBACKs.
    let first = a.recv().await.unwrap();
    let (original_packet_id, original_payload) = match first {
        v3::Packet::Publish(p) => {
            assert!(!p.dup);
            (p.packet_id, p.payload)
        }
        other => panic!("expected Publish, got {:?}", other),
    };
    drop(a);

    let mut a2 = MqttTestClient::connect(addr).await.expect("connect");
    a2.send(&connect_packet("A", false)).await.unwrap();
    let ack = a2.recv().await.unwrap();
    match ack {
        v3::Packet::ConnectAck(ack) => assert!(ack.session_present),
        other => panic!("expected ConnectAck, got {:?}", other),
    }

    let resent = a2.recv().await.unwrap();
    match resent {
        v3::Packet::Publish(p) => {
            assert!(p.dup);
            assert_eq!(p.packet_id, original_packet_id);
            assert_eq!(p.payload, original_payload);
        }
        other => panic!("expected resent Publish with DUP=1, got {:?}", other),
    }

    drop(server);
}

// Real wall-clock wait: the keep-alive deadline is tracked with
// std::time::Instant, so there's no tokio mock clock to fast-forward here.
// keep_alive is kept short (2s) to bound the wait to a handful of seconds.
#[tokio::test]
async fn will_delivery_on_keep_alive_timeout() {
    let server = Server::start(18_934);
    let addr = "127.0.0.1:18934";

    let mut b = MqttTestClient::connect(addr).await.expect("connect");
    b.send(&connect_packet("B", true)).await.unwrap();
    let _ = b.recv().await.unwrap();
    b.send(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "Topic/C".to_string(),
            qos: QoS::ExactlyOnce,
        }],
    }))
    .await
    .unwrap();
    let _ = b.recv().await.unwrap();

    let mut a = MqttTestClient::connect(addr).await.expect("connect");
    a.send(&connect_packet_with_will(
        "A",
        2,
        "Topic/C",
        b"keepalive expiry",
        QoS::ExactlyOnce,
    ))
    .await
    .unwrap();
    let _ = a.recv().await.unwrap();

    // A stays connected but idle — no PINGREQ — so the server's keep-alive
    // check (1.5x keep_alive, 3s here) times it out and arms the will, which
    // the sweeper's 1Hz cadence then picks up and fires.
    let delivered = b.recv().await.unwrap();
    drop(a);
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "Topic/C");
            assert_eq!(p.payload, b"keepalive expiry");
            assert_eq!(p.qos, QoS::ExactlyOnce);
        }
        other => panic!("expected will Publish, got {:?}", other),
    }

    drop(server);
}
