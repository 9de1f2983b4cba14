// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};

use super::connect::ConnectPacket;
use super::connect_ack::ConnectAckPacket;
use super::header::PacketType;
use super::ping_disconnect::{DisconnectPacket, PingRequestPacket, PingResponsePacket};
use super::publish::PublishPacket;
use super::simple_ack::{
    PublishAckPacket, PublishCompletePacket, PublishReceivedPacket, PublishReleasePacket,
};
use super::subscribe::SubscribePacket;
use super::subscribe_ack::SubscribeAckPacket;
use super::unsubscribe::UnsubscribePacket;
use super::unsubscribe_ack::UnsubscribeAckPacket;

/// Any MQTT 3.1.1 control packet, fully decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    PublishReceived(PublishReceivedPacket),
    PublishRelease(PublishReleasePacket),
    PublishComplete(PublishCompletePacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
}

impl Packet {
    /// Decodes one complete packet out of `buf`, which must contain exactly
    /// one fixed-header-plus-body frame (the caller is responsible for
    /// splitting the byte stream on `Remaining Length` boundaries).
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let packet_type = {
            let mut peek = ByteArray::new(buf);
            let byte = peek.read_byte()?;
            PacketType::try_from(byte)?
        };

        let mut ba = ByteArray::new(buf);
        Ok(match packet_type {
            PacketType::Connect => Self::Connect(ConnectPacket::decode(&mut ba)?),
            PacketType::ConnectAck => Self::ConnectAck(ConnectAckPacket::decode(&mut ba)?),
            PacketType::Publish { .. } => Self::Publish(PublishPacket::decode(&mut ba)?),
            PacketType::PublishAck => Self::PublishAck(PublishAckPacket::decode(&mut ba)?),
            PacketType::PublishReceived => {
                Self::PublishReceived(PublishReceivedPacket::decode(&mut ba)?)
            }
            PacketType::PublishRelease => {
                Self::PublishRelease(PublishReleasePacket::decode(&mut ba)?)
            }
            PacketType::PublishComplete => {
                Self::PublishComplete(PublishCompletePacket::decode(&mut ba)?)
            }
            PacketType::Subscribe => Self::Subscribe(SubscribePacket::decode(&mut ba)?),
            PacketType::SubscribeAck => Self::SubscribeAck(SubscribeAckPacket::decode(&mut ba)?),
            PacketType::Unsubscribe => Self::Unsubscribe(UnsubscribePacket::decode(&mut ba)?),
            PacketType::UnsubscribeAck => {
                Self::UnsubscribeAck(UnsubscribeAckPacket::decode(&mut ba)?)
            }
            PacketType::PingRequest => Self::PingRequest(PingRequestPacket::decode(&mut ba)?),
            PacketType::PingResponse => Self::PingResponse(PingResponsePacket::decode(&mut ba)?),
            PacketType::Disconnect => Self::Disconnect(DisconnectPacket::decode(&mut ba)?),
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        match self {
            Self::Connect(p) => p.encode(buf),
            Self::ConnectAck(p) => p.encode(buf),
            Self::Publish(p) => p.encode(buf),
            Self::PublishAck(p) => p.encode(buf),
            Self::PublishReceived(p) => p.encode(buf),
            Self::PublishRelease(p) => p.encode(buf),
            Self::PublishComplete(p) => p.encode(buf),
            Self::Subscribe(p) => p.encode(buf),
            Self::SubscribeAck(p) => p.encode(buf),
            Self::Unsubscribe(p) => p.encode(buf),
            Self::UnsubscribeAck(p) => p.encode(buf),
            Self::PingRequest(p) => p.encode(buf),
            Self::PingResponse(p) => p.encode(buf),
            Self::Disconnect(p) => p.encode(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::QoS;

    #[test]
    fn test_publish_round_trip() {
        let packet = Packet::Publish(PublishPacket {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: "a/b".to_string(),
            packet_id: Some(7),
            payload: b"hello".to_vec(),
        });
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let decoded = Packet::decode(&buf).unwrap();
        assert_eq!(decoded, packet);
    }
}
