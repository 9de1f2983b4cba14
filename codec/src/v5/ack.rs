// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBACK, PUBREC, PUBREL and PUBCOMP in MQTT 5.0 extend the v3.1.1 shape
//! with an optional reason code and property block. A packet carrying
//! reason Success and no properties MAY omit both, per [MQTT-3.4.2-1] and
//! its siblings for the other three packet types.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::PacketId;

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, PropertyId};
use super::reason_code::ReasonCode;

pub const PUBLISH_ACK_PROPERTIES: &[PropertyId] = &[PropertyId::ReasonString, PropertyId::UserProperty];
pub const PUBLISH_ACK_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::NoMatchingSubscribers,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicNameInvalid,
    ReasonCode::PacketIdentifierInUse,
    ReasonCode::QuotaExceeded,
    ReasonCode::PayloadFormatInvalid,
];

pub const PUBLISH_RECEIVED_PROPERTIES: &[PropertyId] = PUBLISH_ACK_PROPERTIES;
pub const PUBLISH_RECEIVED_REASONS: &[ReasonCode] = PUBLISH_ACK_REASONS;

pub const PUBLISH_RELEASE_PROPERTIES: &[PropertyId] = PUBLISH_ACK_PROPERTIES;
pub const PUBLISH_RELEASE_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::PacketIdentifierNotFound,
];

pub const PUBLISH_COMPLETE_PROPERTIES: &[PropertyId] = PUBLISH_ACK_PROPERTIES;
pub const PUBLISH_COMPLETE_REASONS: &[ReasonCode] = PUBLISH_RELEASE_REASONS;

macro_rules! ack_with_reason_packet {
    ($name:ident, $packet_type:expr, $properties:expr, $reasons:expr) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: PacketId,
            pub reason_code: ReasonCode,
            pub properties: Properties,
        }

        impl $name {
            #[must_use]
            pub fn new(packet_id: PacketId, reason_code: ReasonCode) -> Self {
                Self {
                    packet_id,
                    reason_code,
                    properties: Properties::new(),
                }
            }
        }

        impl DecodePacket for $name {
            fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
                let fixed_header = FixedHeader::decode(ba)?;
                let packet_id = ba.read_u16()?;
                if fixed_header.remaining_length() == 2 {
                    return Ok(Self::new(packet_id, ReasonCode::Success));
                }
                let reason_code = ReasonCode::try_from_byte_in(ba.read_byte()?, $reasons)?;
                let properties = if fixed_header.remaining_length() > 3 {
                    let p = Properties::decode(ba)?;
                    p.validate($properties)?;
                    p
                } else {
                    Properties::new()
                };
                Ok(Self {
                    packet_id,
                    reason_code,
                    properties,
                })
            }
        }

        impl EncodePacket for $name {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
                let mut body = Vec::new();
                body.extend_from_slice(&self.packet_id.to_be_bytes());
                if self.reason_code != ReasonCode::Success || !self.properties.0.is_empty() {
                    body.push(self.reason_code.into());
                    if !self.properties.0.is_empty() {
                        self.properties.encode(&mut body)?;
                    }
                }
                let header = FixedHeader::new($packet_type, body.len())?;
                let n = header.encode(buf)?;
                buf.extend_from_slice(&body);
                Ok(n + body.len())
            }
        }
    };
}

ack_with_reason_packet!(
    PublishAckPacket,
    PacketType::PublishAck,
    PUBLISH_ACK_PROPERTIES,
    PUBLISH_ACK_REASONS
);
ack_with_reason_packet!(
    PublishReceivedPacket,
    PacketType::PublishReceived,
    PUBLISH_RECEIVED_PROPERTIES,
    PUBLISH_RECEIVED_REASONS
);
ack_with_reason_packet!(
    PublishReleasePacket,
    PacketType::PublishRelease,
    PUBLISH_RELEASE_PROPERTIES,
    PUBLISH_RELEASE_REASONS
);
ack_with_reason_packet!(
    PublishCompletePacket,
    PacketType::PublishComplete,
    PUBLISH_COMPLETE_PROPERTIES,
    PUBLISH_COMPLETE_REASONS
);
