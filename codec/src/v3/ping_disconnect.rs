// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PINGREQ, PINGRESP and DISCONNECT carry no variable header or payload.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};

use super::header::{FixedHeader, PacketType};

macro_rules! empty_packet {
    ($name:ident, $packet_type:expr) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl DecodePacket for $name {
            fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
                let fixed_header = FixedHeader::decode(ba)?;
                if fixed_header.packet_type() != $packet_type {
                    return Err(DecodeError::InvalidPacketType);
                }
                Ok(Self)
            }
        }

        impl EncodePacket for $name {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
                let header = FixedHeader::new($packet_type, 0)?;
                header.encode(buf)
            }
        }
    };
}

empty_packet!(PingRequestPacket, PacketType::PingRequest);
empty_packet!(PingResponsePacket, PacketType::PingResponse);
empty_packet!(DisconnectPacket, PacketType::Disconnect);
