// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::ProtocolLevel;

use super::header::{FixedHeader, PacketType};
use super::property::{Properties, Property, PropertyId};

pub const CONNECT_PROPERTIES: &[PropertyId] = &[
    PropertyId::SessionExpiryInterval,
    PropertyId::AuthenticationMethod,
    PropertyId::AuthenticationData,
    PropertyId::RequestProblemInformation,
    PropertyId::RequestResponseInformation,
    PropertyId::ReceiveMaximum,
    PropertyId::TopicAliasMaximum,
    PropertyId::MaximumPacketSize,
    PropertyId::UserProperty,
];

pub const WILL_PROPERTIES: &[PropertyId] = &[
    PropertyId::PayloadFormatIndicator,
    PropertyId::MessageExpiryInterval,
    PropertyId::ContentType,
    PropertyId::ResponseTopic,
    PropertyId::CorrelationData,
    PropertyId::WillDelayInterval,
    PropertyId::UserProperty,
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectPacket {
    pub clean_start: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub properties: Properties,
}

impl Default for ConnectPacket {
    fn default() -> Self {
        Self {
            clean_start: true,
            keep_alive: 60,
            client_id: String::new(),
            will: None,
            username: None,
            password: None,
            properties: Properties::new(),
        }
    }
}

impl ConnectPacket {
    #[must_use]
    pub fn session_expiry_interval(&self) -> u32 {
        match self.properties.find(PropertyId::SessionExpiryInterval) {
            Some(Property::SessionExpiryInterval(v)) => *v,
            _ => 0,
        }
    }

    #[must_use]
    pub fn receive_maximum(&self) -> u16 {
        match self.properties.find(PropertyId::ReceiveMaximum) {
            Some(Property::ReceiveMaximum(v)) => *v,
            _ => Property::default_receive_maximum(),
        }
    }

    #[must_use]
    pub fn topic_alias_maximum(&self) -> u16 {
        match self.properties.find(PropertyId::TopicAliasMaximum) {
            Some(Property::TopicAliasMaximum(v)) => *v,
            _ => Property::default_topic_alias_maximum(),
        }
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;

        let protocol_name = ba.read_string_data()?;
        if protocol_name != "MQTT" {
            return Err(DecodeError::InvalidProtocolName);
        }
        let level = ProtocolLevel::try_from(ba.read_byte()?)?;
        if level != ProtocolLevel::V5 {
            return Err(DecodeError::InvalidProtocolLevel);
        }

        let connect_flags = ba.read_byte()?;
        if connect_flags & 0b0000_0001 != 0 {
            return Err(DecodeError::InvalidConnectFlags);
        }
        let clean_start = connect_flags & 0b0000_0010 != 0;
        let will_flag = connect_flags & 0b0000_0100 != 0;
        let will_qos_bits = (connect_flags & 0b0001_1000) >> 3;
        let will_retain = connect_flags & 0b0010_0000 != 0;
        let password_flag = connect_flags & 0b0100_0000 != 0;
        let username_flag = connect_flags & 0b1000_0000 != 0;

        if !will_flag && (will_qos_bits != 0 || will_retain) {
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = ba.read_u16()?;

        let properties = Properties::decode(ba)?;
        properties.validate(CONNECT_PROPERTIES)?;

        let client_id = ba.read_string_data()?;

        let will = if will_flag {
            let will_properties = Properties::decode(ba)?;
            will_properties.validate(WILL_PROPERTIES)?;
            let topic = ba.read_string_data()?;
            let message = ba.read_binary_data()?;
            let qos = QoS::try_from(will_qos_bits)?;
            Some(LastWill {
                topic,
                message,
                qos,
                retain: will_retain,
                properties: will_properties,
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(ba.read_string_data()?)
        } else {
            None
        };
        let password = if password_flag {
            Some(ba.read_binary_data()?)
        } else {
            None
        };

        if client_id.is_empty() && !clean_start {
            return Err(DecodeError::InvalidClientId);
        }

        Ok(Self {
            clean_start,
            keep_alive,
            client_id,
            will,
            username,
            password,
            properties,
        })
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        byte_array::write_string_data(&mut body, "MQTT");
        body.push(ProtocolLevel::V5.into());

        let mut flags: u8 = 0;
        if self.clean_start {
            flags |= 0b0000_0010;
        }
        if let Some(will) = &self.will {
            flags |= 0b0000_0100;
            flags |= u8::from(will.qos) << 3;
            if will.retain {
                flags |= 0b0010_0000;
            }
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }
        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        body.push(flags);
        body.extend_from_slice(&self.keep_alive.to_be_bytes());

        self.properties.encode(&mut body)?;
        byte_array::write_string_data(&mut body, &self.client_id);

        if let Some(will) = &self.will {
            will.properties.encode(&mut body)?;
            byte_array::write_string_data(&mut body, &will.topic);
            byte_array::write_binary_data(&mut body, &will.message);
        }
        if let Some(username) = &self.username {
            byte_array::write_string_data(&mut body, username);
        }
        if let Some(password) = &self.password {
            byte_array::write_binary_data(&mut body, password);
        }

        let header = FixedHeader::new(PacketType::Connect, body.len())?;
        let n = header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(n + body.len())
    }
}
