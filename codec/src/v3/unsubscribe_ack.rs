// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::PacketId;

use super::header::{FixedHeader, PacketType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsubscribeAckPacket {
    pub packet_id: PacketId,
}

impl UnsubscribeAckPacket {
    #[must_use]
    pub const fn new(packet_id: PacketId) -> Self {
        Self { packet_id }
    }
}

impl DecodePacket for UnsubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;
        let packet_id = ba.read_u16()?;
        Ok(Self::new(packet_id))
    }
}

impl EncodePacket for UnsubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let header = FixedHeader::new(PacketType::UnsubscribeAck, 2)?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        Ok(n + 2)
    }
}
