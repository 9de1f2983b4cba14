// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::topic::validate_sub_topic;
use crate::PacketId;

use super::header::{FixedHeader, PacketType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub topic: String,
    pub qos: QoS,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: PacketId,
    pub topics: Vec<SubscribeTopic>,
}

impl DecodePacket for SubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let remaining = fixed_header.remaining_length();
        let start = ba.offset();
        let packet_id = ba.read_u16()?;

        let mut topics = Vec::new();
        while ba.offset() - start < remaining {
            let topic = ba.read_string_data()?;
            if validate_sub_topic(&topic).is_err() {
                log::error!("[MQTT-3.8.3-4] invalid topic filter in SUBSCRIBE: {}", topic);
                return Err(DecodeError::EmptyTopic);
            }
            let options = ba.read_byte()?;
            if options & 0b1111_1100 != 0 {
                log::error!("[MQTT-3.8.3-5] reserved SUBSCRIBE options bits must be 0");
                return Err(DecodeError::InvalidPacketFlags);
            }
            let qos = QoS::try_from(options & 0b0000_0011)?;
            topics.push(SubscribeTopic { topic, qos });
        }

        if topics.is_empty() {
            log::error!("[MQTT-3.8.3-3] SUBSCRIBE must contain at least one topic filter");
            return Err(DecodeError::EmptyTopic);
        }

        Ok(Self { packet_id, topics })
    }
}

impl EncodePacket for SubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        for t in &self.topics {
            byte_array::write_string_data(&mut body, &t.topic);
            body.push(t.qos.into());
        }
        let header = FixedHeader::new(PacketType::Subscribe, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
