// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::topic::validate_sub_topic;
use crate::PacketId;

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, PropertyId};

pub const UNSUBSCRIBE_PROPERTIES: &[PropertyId] = &[PropertyId::UserProperty];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: PacketId,
    pub properties: Properties,
    pub topics: Vec<String>,
}

impl DecodePacket for UnsubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let remaining = fixed_header.remaining_length();
        let start = ba.offset();

        let packet_id = ba.read_u16()?;
        let properties = Properties::decode(ba)?;
        properties.validate(UNSUBSCRIBE_PROPERTIES)?;

        let mut topics = Vec::new();
        while ba.offset() - start < remaining {
            let topic = ba.read_string_data()?;
            if validate_sub_topic(&topic).is_err() {
                return Err(DecodeError::EmptyTopic);
            }
            topics.push(topic);
        }
        if topics.is_empty() {
            return Err(DecodeError::EmptyTopic);
        }

        Ok(Self {
            packet_id,
            properties,
            topics,
        })
    }
}

impl EncodePacket for UnsubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        self.properties.encode(&mut body)?;
        for topic in &self.topics {
            byte_array::write_string_data(&mut body, topic);
        }
        let header = FixedHeader::new(PacketType::Unsubscribe, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
