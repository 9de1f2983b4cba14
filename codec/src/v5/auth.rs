// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, PropertyId};
use super::reason_code::ReasonCode;

pub const AUTH_PROPERTIES: &[PropertyId] = &[
    PropertyId::AuthenticationMethod,
    PropertyId::AuthenticationData,
    PropertyId::ReasonString,
    PropertyId::UserProperty,
];

pub const AUTH_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::ContinueAuthentication,
    ReasonCode::ReAuthenticate,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthPacket {
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl DecodePacket for AuthPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Auth {
            return Err(DecodeError::InvalidPacketType);
        }
        if fixed_header.remaining_length() == 0 {
            return Ok(Self {
                reason_code: ReasonCode::Success,
                properties: Properties::new(),
            });
        }
        let reason_code = ReasonCode::try_from_byte_in(ba.read_byte()?, AUTH_REASONS)?;
        let properties = if fixed_header.remaining_length() > 1 {
            let p = Properties::decode(ba)?;
            p.validate(AUTH_PROPERTIES)?;
            p
        } else {
            Properties::new()
        };
        Ok(Self {
            reason_code,
            properties,
        })
    }
}

impl EncodePacket for AuthPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.push(self.reason_code.into());
        self.properties.encode(&mut body)?;
        let header = FixedHeader::new(PacketType::Auth, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
