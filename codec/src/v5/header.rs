// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::var_int::VarInt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketType {
    #[default]
    Connect,
    ConnectAck,
    Publish {
        dup: bool,
        qos: QoS,
        retain: bool,
    },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
    /// MQTT 5.0 only; absent from the v3.1.1 type space [MQTT-3.15.1-1].
    Auth,
}

impl From<PacketType> for u8 {
    fn from(t: PacketType) -> u8 {
        let type_bits: u8 = match t {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
            PacketType::Auth => 15,
        };
        let flags: u8 = match t {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b1000 } else { 0 };
                let qos: u8 = qos.into();
                let retain = if retain { 0b0001 } else { 0 };
                dup | (qos << 1) | retain
            }
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => 0b0010,
            _ => 0,
        };
        (type_bits << 4) | flags
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0xf0) >> 4;
        let flags = v & 0x0f;
        match type_bits {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnectAck),
            3 => {
                let dup = flags & 0b1000 != 0;
                let retain = flags & 0b0001 != 0;
                let qos = QoS::try_from((flags & 0b0110) >> 1)?;
                Ok(Self::Publish { dup, qos, retain })
            }
            4 => Ok(Self::PublishAck),
            5 => Ok(Self::PublishReceived),
            6 => {
                if flags != 0b0010 {
                    return Err(DecodeError::InvalidPacketFlags);
                }
                Ok(Self::PublishRelease)
            }
            7 => Ok(Self::PublishComplete),
            8 => {
                if flags != 0b0010 {
                    return Err(DecodeError::InvalidPacketFlags);
                }
                Ok(Self::Subscribe)
            }
            9 => Ok(Self::SubscribeAck),
            10 => {
                if flags != 0b0010 {
                    return Err(DecodeError::InvalidPacketFlags);
                }
                Ok(Self::Unsubscribe)
            }
            11 => Ok(Self::UnsubscribeAck),
            12 => Ok(Self::PingRequest),
            13 => Ok(Self::PingResponse),
            14 => Ok(Self::Disconnect),
            15 => Ok(Self::Auth),
            t => {
                log::error!("Invalid packet type bits: {}", t);
                Err(DecodeError::InvalidPacketType)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: VarInt,
}

impl FixedHeader {
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        Ok(Self {
            packet_type,
            remaining_length: VarInt::new(remaining_length)?,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let byte = ba.read_byte()?;
        let packet_type = PacketType::try_from(byte)?;
        let remaining_length = VarInt::decode(ba)?;
        if ba.remaining_bytes() < remaining_length.value() {
            return Err(DecodeError::InvalidRemainingLength);
        }
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(self.packet_type.into());
        let n = self.remaining_length.encode(buf)?;
        Ok(1 + n)
    }
}
