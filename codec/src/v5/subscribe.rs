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
use super::property::{Properties, PropertyId};

pub const SUBSCRIBE_PROPERTIES: &[PropertyId] =
    &[PropertyId::SubscriptionIdentifier, PropertyId::UserProperty];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetainHandling {
    SendAtSubscribe,
    SendIfNewSubscription,
    DoNotSend,
}

impl From<RetainHandling> for u8 {
    fn from(rh: RetainHandling) -> u8 {
        match rh {
            RetainHandling::SendAtSubscribe => 0,
            RetainHandling::SendIfNewSubscription => 1,
            RetainHandling::DoNotSend => 2,
        }
    }
}

impl TryFrom<u8> for RetainHandling {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::SendAtSubscribe),
            1 => Ok(Self::SendIfNewSubscription),
            2 => Ok(Self::DoNotSend),
            _ => Err(DecodeError::InvalidPacketFlags),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub topic: String,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: PacketId,
    pub properties: Properties,
    pub topics: Vec<SubscribeTopic>,
}

impl DecodePacket for SubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let remaining = fixed_header.remaining_length();
        let start = ba.offset();

        let packet_id = ba.read_u16()?;
        let properties = Properties::decode(ba)?;
        properties.validate(SUBSCRIBE_PROPERTIES)?;

        let mut topics = Vec::new();
        while ba.offset() - start < remaining {
            let topic = ba.read_string_data()?;
            if validate_sub_topic(&topic).is_err() {
                return Err(DecodeError::EmptyTopic);
            }
            let options = ba.read_byte()?;
            if options & 0b1100_0000 != 0 {
                return Err(DecodeError::InvalidPacketFlags);
            }
            let qos = QoS::try_from(options & 0b0000_0011)?;
            let no_local = options & 0b0000_0100 != 0;
            let retain_as_published = options & 0b0000_1000 != 0;
            let retain_handling = RetainHandling::try_from((options & 0b0011_0000) >> 4)?;
            topics.push(SubscribeTopic {
                topic,
                qos,
                no_local,
                retain_as_published,
                retain_handling,
            });
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

impl EncodePacket for SubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        self.properties.encode(&mut body)?;
        for t in &self.topics {
            byte_array::write_string_data(&mut body, &t.topic);
            let mut options: u8 = t.qos.into();
            if t.no_local {
                options |= 0b0000_0100;
            }
            if t.retain_as_published {
                options |= 0b0000_1000;
            }
            options |= u8::from(t.retain_handling) << 4;
            body.push(options);
        }
        let header = FixedHeader::new(PacketType::Subscribe, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
