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
        };

        let flags: u8 = match t {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b1000 } else { 0 };
                let qos: u8 = qos.into();
                let retain = if retain { 0b0001 } else { 0 };
                dup | (qos << 1) | retain
            }
            // [MQTT-3.6.1-1], [MQTT-3.8.1-1], [MQTT-3.10.1-1]: reserved bits
            // of PUBREL/SUBSCRIBE/UNSUBSCRIBE are fixed at 0b0010.
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
                    log::error!("[MQTT-3.6.1-1] invalid PUBREL flags: {:#06b}", flags);
                    Err(DecodeError::InvalidPacketFlags)
                } else {
                    Ok(Self::PublishRelease)
                }
            }
            7 => Ok(Self::PublishComplete),
            8 => {
                if flags != 0b0010 {
                    log::error!("[MQTT-3.8.1-1] invalid SUBSCRIBE flags: {:#06b}", flags);
                    Err(DecodeError::InvalidPacketFlags)
                } else {
                    Ok(Self::Subscribe)
                }
            }
            9 => Ok(Self::SubscribeAck),
            10 => {
                if flags != 0b0010 {
                    log::error!("[MQTT-3.10.1-1] invalid UNSUBSCRIBE flags: {:#06b}", flags);
                    Err(DecodeError::InvalidPacketFlags)
                } else {
                    Ok(Self::Unsubscribe)
                }
            }
            11 => Ok(Self::UnsubscribeAck),
            12 => Ok(Self::PingRequest),
            13 => Ok(Self::PingResponse),
            14 => Ok(Self::Disconnect),
            t => {
                log::error!("Invalid packet type bits: {}", t);
                Err(DecodeError::InvalidPacketType)
            }
        }
    }
}

/// Fixed header common to every MQTT 3.1.1 control packet: one type+flags
/// byte, followed by a variable-byte `Remaining Length`.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_header_round_trip() {
        let header = FixedHeader::new(PacketType::PublishAck, 2).unwrap();
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x40, 0x02]);

        let mut ba = ByteArray::new(&buf);
        let decoded = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_type(), PacketType::PublishAck);
        assert_eq!(decoded.remaining_length(), 2);
    }

    #[test]
    fn test_pubrel_rejects_bad_flags() {
        assert!(PacketType::try_from(0b0110_0000).is_err());
        assert!(PacketType::try_from(0b0110_0010).is_ok());
    }
}
