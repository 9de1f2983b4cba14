// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBACK, PUBREC, PUBREL and PUBCOMP all share the same wire shape in
//! MQTT 3.1.1: two bytes carrying the packet identifier and nothing else.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::PacketId;

use super::header::{FixedHeader, PacketType};

macro_rules! packet_id_only_packet {
    ($name:ident, $packet_type:expr) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: PacketId,
        }

        impl $name {
            #[must_use]
            pub const fn new(packet_id: PacketId) -> Self {
                Self { packet_id }
            }
        }

        impl DecodePacket for $name {
            fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
                let fixed_header = FixedHeader::decode(ba)?;
                if fixed_header.packet_type() != $packet_type {
                    return Err(DecodeError::InvalidPacketType);
                }
                let packet_id = ba.read_u16()?;
                Ok(Self::new(packet_id))
            }
        }

        impl EncodePacket for $name {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
                let header = FixedHeader::new($packet_type, 2)?;
                let n = header.encode(buf)?;
                buf.extend_from_slice(&self.packet_id.to_be_bytes());
                Ok(n + 2)
            }
        }
    };
}

packet_id_only_packet!(PublishAckPacket, PacketType::PublishAck);
packet_id_only_packet!(PublishReceivedPacket, PacketType::PublishReceived);
packet_id_only_packet!(PublishReleasePacket, PacketType::PublishRelease);
packet_id_only_packet!(PublishCompletePacket, PacketType::PublishComplete);
