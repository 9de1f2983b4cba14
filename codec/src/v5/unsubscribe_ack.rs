// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::PacketId;

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, PropertyId};
use super::reason_code::ReasonCode;

pub const UNSUBSCRIBE_ACK_PROPERTIES: &[PropertyId] =
    &[PropertyId::ReasonString, PropertyId::UserProperty];

pub const UNSUBSCRIBE_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::NoSubscriptionExisted,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicFilterInvalid,
    ReasonCode::PacketIdentifierInUse,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsubscribeAckPacket {
    pub packet_id: PacketId,
    pub properties: Properties,
    pub reason_codes: Vec<ReasonCode>,
}

impl DecodePacket for UnsubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let start = ba.offset();
        let packet_id = ba.read_u16()?;
        let properties = Properties::decode(ba)?;
        properties.validate(UNSUBSCRIBE_ACK_PROPERTIES)?;

        let header_len = ba.offset() - start;
        let n = fixed_header.remaining_length() - header_len;
        let mut reason_codes = Vec::with_capacity(n);
        for _ in 0..n {
            reason_codes.push(ReasonCode::try_from_byte_in(
                ba.read_byte()?,
                UNSUBSCRIBE_REASONS,
            )?);
        }

        Ok(Self {
            packet_id,
            properties,
            reason_codes,
        })
    }
}

impl EncodePacket for UnsubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        self.properties.encode(&mut body)?;
        for code in &self.reason_codes {
            body.push((*code).into());
        }
        let header = FixedHeader::new(PacketType::UnsubscribeAck, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
