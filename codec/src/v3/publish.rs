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

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<PacketId>,
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
            payload,
        }
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
            log::error!("[MQTT-3.3.1-2] DUP must be 0 for QoS 0 PUBLISH");
            return Err(DecodeError::InvalidPacketFlags);
        }

        let consumed_before = ba.offset();
        let topic = ba.read_string_data()?;
        if validate_pub_topic(&topic).is_err() {
            log::error!("[MQTT-3.3.2-2] invalid topic name in PUBLISH: {}", topic);
            return Err(DecodeError::EmptyTopic);
        }

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };

        let header_len = ba.offset() - consumed_before;
        let payload_len = fixed_header.remaining_length() - header_len;
        let payload = ba.read_bytes(payload_len)?.to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
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
