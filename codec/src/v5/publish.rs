// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::topic::validate_pub_topic;
use crate::PacketId;

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, PropertyId};

pub const PUBLISH_PROPERTIES: &[PropertyId] = &[
    PropertyId::PayloadFormatIndicator,
    PropertyId::MessageExpiryInterval,
    PropertyId::ContentType,
    PropertyId::ResponseTopic,
    PropertyId::CorrelationData,
    PropertyId::SubscriptionIdentifier,
    PropertyId::TopicAlias,
    PropertyId::UserProperty,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<PacketId>,
    pub properties: Properties,
    pub payload: Vec<u8>,
}

impl PublishPacket {
    #[must_use]
    pub fn new(topic: &str, qos: QoS, payload: Vec<u8>) -> Self {
        Self {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id: None,
            properties: Properties::new(),
            payload,
        }
    }

    #[must_use]
    pub fn topic_alias(&self) -> Option<u16> {
        self.properties.iter().find_map(|p| match p {
            super::property::Property::TopicAlias(a) => Some(*a),
            _ => None,
        })
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let (dup, qos, retain) = match fixed_header.packet_type() {
            PacketType::Publish { dup, qos, retain } => (dup, qos, retain),
            _ => return Err(DecodeError::InvalidPacketType),
        };
        if qos == QoS::AtMostOnce && dup {
            return Err(DecodeError::InvalidPacketFlags);
        }

        let consumed_before = ba.offset();
        let topic = ba.read_string_data()?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };

        let properties = Properties::decode(ba)?;
        properties.validate(PUBLISH_PROPERTIES)?;

        let has_alias = properties
            .iter()
            .any(|p| matches!(p, super::property::Property::TopicAlias(_)));
        if topic.is_empty() && !has_alias {
            log::error!("[MQTT-3.3.2-1] empty topic name requires a TopicAlias");
            return Err(DecodeError::EmptyTopic);
        }
        if !topic.is_empty() && validate_pub_topic(&topic).is_err() {
            return Err(DecodeError::EmptyTopic);
        }

        let header_len = ba.offset() - consumed_before;
        let payload_len = fixed_header.remaining_length() - header_len;
        let payload = ba.read_bytes(payload_len)?.to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            properties,
            payload,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        byte_array::write_string_data(&mut body, &self.topic);
        if self.qos != QoS::AtMostOnce {
            let packet_id = self.packet_id.unwrap_or(0);
            body.extend_from_slice(&packet_id.to_be_bytes());
        }
        self.properties.encode(&mut body)?;
        body.extend_from_slice(&self.payload);

        let packet_type = PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        };
        let header = FixedHeader::new(packet_type, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
