// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::PacketId;

use super::header::{FixedHeader, PacketType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeAck {
    MaxQoS(QoS),
    Failure,
}

impl From<SubscribeAck> for u8 {
    fn from(ack: SubscribeAck) -> u8 {
        match ack {
            SubscribeAck::MaxQoS(qos) => qos.into(),
            SubscribeAck::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAck {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if v == 0x80 {
            Ok(Self::Failure)
        } else {
            Ok(Self::MaxQoS(QoS::try_from(v)?))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    pub packet_id: PacketId,
    pub acks: Vec<SubscribeAck>,
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let packet_id = ba.read_u16()?;
        let n = fixed_header.remaining_length() - 2;
        let mut acks = Vec::with_capacity(n);
        for _ in 0..n {
            acks.push(SubscribeAck::try_from(ba.read_byte()?)?);
        }
        Ok(Self { packet_id, acks })
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let header = FixedHeader::new(PacketType::SubscribeAck, 2 + self.acks.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        for ack in &self.acks {
            buf.push((*ack).into());
        }
        Ok(n + 2 + self.acks.len())
    }
}
