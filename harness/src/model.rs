// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Controllable actions and observable events for the broker conformance
//! model. An `Action` is something the harness can choose to send; an
//! `Observation` is what came back on the wire in response.

use codec::{PacketId, QoS};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Connect {
        client_id: String,
        clean_start: bool,
        keep_alive: u16,
    },
    Subscribe {
        packet_id: PacketId,
        topic: String,
        qos: QoS,
    },
    Unsubscribe {
        packet_id: PacketId,
        topic: String,
    },
    Publish {
        packet_id: Option<PacketId>,
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
        dup: bool,
    },
    PublishAck {
        packet_id: PacketId,
    },
    PublishReceived {
        packet_id: PacketId,
    },
    PublishRelease {
        packet_id: PacketId,
    },
    PublishComplete {
        packet_id: PacketId,
    },
    PingRequest,
    Disconnect,
}

impl Action {
    /// The name used as the first element of a trace-tree arc key.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Action::Connect { .. } => "connect",
            Action::Subscribe { .. } => "subscribe",
            Action::Unsubscribe { .. } => "unsubscribe",
            Action::Publish { .. } => "publish",
            Action::PublishAck { .. } => "puback",
            Action::PublishReceived { .. } => "pubrec",
            Action::PublishRelease { .. } => "pubrel",
            Action::PublishComplete { .. } => "pubcomp",
            Action::PingRequest => "pingreq",
            Action::Disconnect => "disconnect",
        }
    }

    /// Converts this action to a `v3::Packet` the client can send. v5 is
    /// not modeled here: the harness exercises the v3.1.1 surface, which
    /// every literal scenario in the conformance properties is stated in.
    #[must_use]
    pub fn to_v3_packet(&self) -> codec::v3::Packet {
        use codec::v3;
        match self.clone() {
            Action::Connect {
                client_id,
                clean_start,
                keep_alive,
            } => v3::Packet::Connect(v3::ConnectPacket {
                protocol_level: codec::ProtocolLevel::V311,
                clean_session: clean_start,
                keep_alive,
                client_id,
                will: None,
                username: None,
                password: None,
            }),
            Action::Subscribe {
                packet_id,
                topic,
                qos,
            } => v3::Packet::Subscribe(v3::SubscribePacket {
                packet_id,
                topics: vec![v3::SubscribeTopic { topic, qos }],
            }),
            Action::Unsubscribe { packet_id, topic } => {
                v3::Packet::Unsubscribe(v3::UnsubscribePacket {
                    packet_id,
                    topics: vec![topic],
                })
            }
            Action::Publish {
                packet_id,
                topic,
                payload,
                qos,
                retain,
                dup,
            } => v3::Packet::Publish(v3::PublishPacket {
                dup,
                qos,
                retain,
                topic,
                packet_id,
                payload,
            }),
            Action::PublishAck { packet_id } => {
                v3::Packet::PublishAck(v3::PublishAckPacket { packet_id })
            }
            Action::PublishReceived { packet_id } => {
                v3::Packet::PublishReceived(v3::PublishReceivedPacket { packet_id })
            }
            Action::PublishRelease { packet_id } => {
                v3::Packet::PublishRelease(v3::PublishReleasePacket { packet_id })
            }
            Action::PublishComplete { packet_id } => {
                v3::Packet::PublishComplete(v3::PublishCompletePacket { packet_id })
            }
            Action::PingRequest => v3::Packet::PingRequest(v3::PingRequestPacket),
            Action::Disconnect => v3::Packet::Disconnect(v3::DisconnectPacket),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    ConnectAck {
        session_present: bool,
        accepted: bool,
    },
    SubscribeAck {
        packet_id: PacketId,
    },
    UnsubscribeAck {
        packet_id: PacketId,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        dup: bool,
        retain: bool,
        packet_id: Option<PacketId>,
    },
    PublishAck {
        packet_id: PacketId,
    },
    PublishReceived {
        packet_id: PacketId,
    },
    PublishRelease {
        packet_id: PacketId,
    },
    PublishComplete {
        packet_id: PacketId,
    },
    PingResponse,
    Closed,
}

impl From<codec::v3::Packet> for Observation {
    fn from(packet: codec::v3::Packet) -> Self {
        use codec::v3::Packet;
        match packet {
            Packet::ConnectAck(ack) => Observation::ConnectAck {
                session_present: ack.session_present,
                accepted: ack.return_code == codec::v3::ConnectReturnCode::Accepted,
            },
            Packet::SubscribeAck(ack) => Observation::SubscribeAck {
                packet_id: ack.packet_id,
            },
            Packet::UnsubscribeAck(ack) => Observation::UnsubscribeAck {
                packet_id: ack.packet_id,
            },
            Packet::Publish(p) => Observation::Publish {
                topic: p.topic,
                payload: p.payload,
                qos: p.qos,
                dup: p.dup,
                retain: p.retain,
                packet_id: p.packet_id,
            },
            Packet::PublishAck(ack) => Observation::PublishAck {
                packet_id: ack.packet_id,
            },
            Packet::PublishReceived(ack) => Observation::PublishReceived {
                packet_id: ack.packet_id,
            },
            Packet::PublishRelease(rel) => Observation::PublishRelease {
                packet_id: rel.packet_id,
            },
            Packet::PublishComplete(comp) => Observation::PublishComplete {
                packet_id: comp.packet_id,
            },
            Packet::PingResponse(_) => Observation::PingResponse,
            // Client-to-server-only packets never arrive as observations in
            // practice; fold them to Closed rather than panic on a decode
            // that should never be produced by a conforming broker.
            _ => Observation::Closed,
        }
    }
}
