// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! End-to-end scenarios driven over an in-memory transport, exercising the
//! real connection/dispatcher/broker path without opening a socket.

mod common;

use codec::{v3, QoS};

use common::TestBroker;

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
async fn test_basic_qos2_round_trip() {
    let harness = TestBroker::new();
    let mut client = harness.connect_client();

    client.send_v3(&connect_packet("myclientid", true)).await;
    let ack = client.recv_v3().await;
    assert!(matches!(
        ack,
        v3::Packet::ConnectAck(v3::ConnectAckPacket {
            return_code: v3::ConnectReturnCode::Accepted,
            ..
        })
    ));

    client
        .send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA".to_string(),
                qos: QoS::ExactlyOnce,
            }],
        }))
        .await;
    let suback = client.recv_v3().await;
    assert!(matches!(suback, v3::Packet::SubscribeAck(_)));

    client
        .send_v3(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::ExactlyOnce,
            retain: false,
            topic: "TopicA".to_string(),
            packet_id: Some(42),
            payload: b"qos 2".to_vec(),
        }))
        .await;

    let pubrec = client.recv_v3().await;
    assert!(matches!(pubrec, v3::Packet::PublishReceived(_)));

    client
        .send_v3(&v3::Packet::PublishRelease(v3::PublishReleasePacket {
            packet_id: 42,
        }))
        .await;
    let pubcomp = client.recv_v3().await;
    assert!(matches!(pubcomp, v3::Packet::PublishComplete(_)));

    // The client is its own subscriber, so the routed copy only appears
    // once the PUBREL has released the held PUBLISH into the broker.
    let delivered = client.recv_v3().await;
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "TopicA");
            assert_eq!(p.payload, b"qos 2");
            assert_eq!(p.qos, QoS::ExactlyOnce);
        }
        other => panic!("expected Publish, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retained_propagation_and_clear() {
    let harness = TestBroker::new();
    let mut publisher = harness.connect_client();
    publisher.send_v3(&connect_packet("pub1", true)).await;
    let _ = publisher.recv_v3().await;

    for (topic, qos) in [
        ("TopicA/B", QoS::AtMostOnce),
        ("Topic/C", QoS::AtLeastOnce),
        ("TopicA/C", QoS::ExactlyOnce),
    ] {
        publisher
            .send_v3(&v3::Packet::Publish(v3::PublishPacket {
                dup: false,
                qos,
                retain: true,
                topic: topic.to_string(),
                packet_id: if qos == QoS::AtMostOnce { None } else { Some(1) },
                payload: b"payload".to_vec(),
            }))
            .await;
        match qos {
            QoS::AtLeastOnce => {
                let _ = publisher.recv_v3().await;
            }
            QoS::ExactlyOnce => {
                let _ = publisher.recv_v3().await; // PUBREC
                publisher
                    .send_v3(&v3::Packet::PublishRelease(v3::PublishReleasePacket {
                        packet_id: 1,
                    }))
                    .await;
                let _ = publisher.recv_v3().await; // PUBCOMP
            }
            QoS::AtMostOnce => {}
        }
    }

    let mut subscriber = harness.connect_client();
    subscriber.send_v3(&connect_packet("sub1", true)).await;
    let _ = subscriber.recv_v3().await;

    subscriber
        .send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA/#".to_string(),
                qos: QoS::ExactlyOnce,
            }],
        }))
        .await;

    let _suback = subscriber.recv_v3().await;
    let first = subscriber.recv_v3().await;
    let second = subscriber.recv_v3().await;

    let topics: Vec<String> = [first, second]
        .into_iter()
        .map(|p| match p {
            v3::Packet::Publish(p) => p.topic,
            other => panic!("expected Publish, got {:?}", other),
        })
        .collect();
    assert!(topics.contains(&"TopicA/B".to_string()));
    assert!(topics.contains(&"TopicA/C".to_string()));

    publisher
        .send_v3(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic: "TopicA/B".to_string(),
            packet_id: None,
            payload: Vec::new(),
        }))
        .await;
    publisher
        .send_v3(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic: "TopicA/C".to_string(),
            packet_id: None,
            payload: Vec::new(),
        }))
        .await;

    let mut subscriber2 = harness.connect_client();
    subscriber2.send_v3(&connect_packet("sub2", true)).await;
    let _ = subscriber2.recv_v3().await;
    subscriber2
        .send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
            packet_id: 1,
            topics: vec![v3::SubscribeTopic {
                topic: "TopicA/#".to_string(),
                qos: QoS::ExactlyOnce,
            }],
        }))
        .await;
    let suback2 = subscriber2.recv_v3().await;
    assert!(matches!(suback2, v3::Packet::SubscribeAck(_)));

    // No retained messages remain under TopicA/#, so nothing further should
    // arrive; send a plain publish on an unrelated topic and confirm it's
    // the next thing subscriber2 sees instead of a stale retained replay.
    publisher
        .send_v3(&v3::Packet::Publish(v3::PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: "TopicA/D".to_string(),
            packet_id: None,
            payload: b"live".to_vec(),
        }))
        .await;
    let next = subscriber2.recv_v3().await;
    match next {
        v3::Packet::Publish(p) => assert_eq!(p.topic, "TopicA/D"),
        other => panic!("expected Publish, got {:?}", other),
    }
}

#[tokio::test]
async fn test_offline_queueing_and_session_present() {
    let harness = TestBroker::new();

    let mut a = harness.connect_client();
    a.send_v3(&connect_packet("A", false)).await;
    let _ = a.recv_v3().await;
    a.send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "fromb/#".to_string(),
            qos: QoS::ExactlyOnce,
        }],
    }))
    .await;
    let _ = a.recv_v3().await;
    a.send_v3(&v3::Packet::Disconnect(v3::DisconnectPacket)).await;
    drop(a);

    let mut b = harness.connect_client();
    b.send_v3(&connect_packet("B", true)).await;
    let _ = b.recv_v3().await;
    b.send_v3(&v3::Packet::Publish(v3::PublishPacket {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: "fromb/qos1".to_string(),
        packet_id: Some(1),
        payload: b"qos 1".to_vec(),
    }))
    .await;
    let _ = b.recv_v3().await;
    b.send_v3(&v3::Packet::Disconnect(v3::DisconnectPacket)).await;
    drop(b);

    let mut a2 = harness.connect_client();
    a2.send_v3(&connect_packet("A", false)).await;
    let ack = a2.recv_v3().await;
    match ack {
        v3::Packet::ConnectAck(ack) => assert!(ack.session_present),
        other => panic!("expected ConnectAck, got {:?}", other),
    }

    let delivered = a2.recv_v3().await;
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "fromb/qos1");
            assert_eq!(p.payload, b"qos 1");
            assert_eq!(p.qos, QoS::AtLeastOnce);
        }
        other => panic!("expected queued Publish, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redelivery_on_reconnect_with_dup() {
    let harness = TestBroker::new();

    let mut a = harness.connect_client();
    a.send_v3(&connect_packet("A", false)).await;
    let _ = a.recv_v3().await;
    a.send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "fromb/#".to_string(),
            qos: QoS::AtLeastOnce,
        }],
    }))
    .await;
    let _ = a.recv_v3().await;

    let mut b = harness.connect_client();
    b.send_v3(&connect_packet("B", true)).await;
    let _ = b.recv_v3().await;
    b.send_v3(&v3::Packet::Publish(v3::PublishPacket {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: "fromb/qos1".to_string(),
        packet_id: Some(1),
        payload: b"qos 1".to_vec(),
    }))
    .await;
    let _ = b.recv_v3().await;

    // A gets the live copy but the connection drops before it PUBACKs.
    let first = a.recv_v3().await;
    let (original_packet_id, original_payload) = match first {
        v3::Packet::Publish(p) => {
            assert!(!p.dup);
            (p.packet_id, p.payload)
        }
        other => panic!("expected Publish, got {:?}", other),
    };
    drop(a);

    let mut a2 = harness.connect_client();
    a2.send_v3(&connect_packet("A", false)).await;
    let ack = a2.recv_v3().await;
    match ack {
        v3::Packet::ConnectAck(ack) => assert!(ack.session_present),
        other => panic!("expected ConnectAck, got {:?}", other),
    }

    let resent = a2.recv_v3().await;
    match resent {
        v3::Packet::Publish(p) => {
            assert!(p.dup);
            assert_eq!(p.packet_id, original_packet_id);
            assert_eq!(p.payload, original_payload);
        }
        other => panic!("expected resent Publish with DUP=1, got {:?}", other),
    }
}

// Real wall-clock wait: the keep-alive timeout and will-delay deadline are
// both tracked with std::time::Instant, not tokio's mockable clock, so
// there's no way to fast-forward this one. keep_alive is kept short (2s)
// to bound the wait to a handful of real seconds.
#[tokio::test]
async fn test_will_delivery_on_keep_alive_timeout() {
    let harness = TestBroker::new();

    let mut b = harness.connect_client();
    b.send_v3(&connect_packet("B", true)).await;
    let _ = b.recv_v3().await;
    b.send_v3(&v3::Packet::Subscribe(v3::SubscribePacket {
        packet_id: 1,
        topics: vec![v3::SubscribeTopic {
            topic: "Topic/C".to_string(),
            qos: QoS::ExactlyOnce,
        }],
    }))
    .await;
    let _ = b.recv_v3().await;

    let mut a = harness.connect_client();
    a.send_v3(&connect_packet_with_will(
        "A",
        2,
        "Topic/C",
        b"keepalive expiry",
        QoS::ExactlyOnce,
    ))
    .await;
    let _ = a.recv_v3().await;

    // 1.5x keep_alive (3s) for the connection task to notice the timeout
    // and disconnect A, arming the will; sweep() fires it (delay is 0).
    tokio::time::sleep(std::time::Duration::from_secs(4)).await;
    harness.broker.lock().await.sweep().await;

    let delivered = b.recv_v3().await;
    match delivered {
        v3::Packet::Publish(p) => {
            assert_eq!(p.topic, "Topic/C");
            assert_eq!(p.payload, b"keepalive expiry");
            assert_eq!(p.qos, QoS::ExactlyOnce);
        }
        other => panic!("expected will Publish, got {:?}", other),
    }
}
