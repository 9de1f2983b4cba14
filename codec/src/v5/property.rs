// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! MQTT 5.0 properties: a tagged union of 27 identifiers, each legal only on
//! a fixed subset of packet types. `Properties` is the length-prefixed list
//! carried in a packet's variable header.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::var_int::VarInt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyId {
    PayloadFormatIndicator,
    MessageExpiryInterval,
    ContentType,
    ResponseTopic,
    CorrelationData,
    SubscriptionIdentifier,
    SessionExpiryInterval,
    AssignedClientIdentifier,
    ServerKeepAlive,
    AuthenticationMethod,
    AuthenticationData,
    RequestProblemInformation,
    WillDelayInterval,
    RequestResponseInformation,
    ResponseInformation,
    ServerReference,
    ReasonString,
    ReceiveMaximum,
    TopicAliasMaximum,
    TopicAlias,
    MaximumQoS,
    RetainAvailable,
    UserProperty,
    MaximumPacketSize,
    WildcardSubscriptionAvailable,
    SubscriptionIdentifierAvailable,
    SharedSubscriptionAvailable,
}

impl From<PropertyId> for u8 {
    fn from(id: PropertyId) -> u8 {
        match id {
            PropertyId::PayloadFormatIndicator => 0x01,
            PropertyId::MessageExpiryInterval => 0x02,
            PropertyId::ContentType => 0x03,
            PropertyId::ResponseTopic => 0x08,
            PropertyId::CorrelationData => 0x09,
            PropertyId::SubscriptionIdentifier => 0x0b,
            PropertyId::SessionExpiryInterval => 0x11,
            PropertyId::AssignedClientIdentifier => 0x12,
            PropertyId::ServerKeepAlive => 0x13,
            PropertyId::AuthenticationMethod => 0x15,
            PropertyId::AuthenticationData => 0x16,
            PropertyId::RequestProblemInformation => 0x17,
            PropertyId::WillDelayInterval => 0x18,
            PropertyId::RequestResponseInformation => 0x19,
            PropertyId::ResponseInformation => 0x1a,
            PropertyId::ServerReference => 0x1c,
            PropertyId::ReasonString => 0x1f,
            PropertyId::ReceiveMaximum => 0x21,
            PropertyId::TopicAliasMaximum => 0x22,
            PropertyId::TopicAlias => 0x23,
            PropertyId::MaximumQoS => 0x24,
            PropertyId::RetainAvailable => 0x25,
            PropertyId::UserProperty => 0x26,
            PropertyId::MaximumPacketSize => 0x27,
            PropertyId::WildcardSubscriptionAvailable => 0x28,
            PropertyId::SubscriptionIdentifierAvailable => 0x29,
            PropertyId::SharedSubscriptionAvailable => 0x2a,
        }
    }
}

impl TryFrom<u8> for PropertyId {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0x01 => Self::PayloadFormatIndicator,
            0x02 => Self::MessageExpiryInterval,
            0x03 => Self::ContentType,
            0x08 => Self::ResponseTopic,
            0x09 => Self::CorrelationData,
            0x0b => Self::SubscriptionIdentifier,
            0x11 => Self::SessionExpiryInterval,
            0x12 => Self::AssignedClientIdentifier,
            0x13 => Self::ServerKeepAlive,
            0x15 => Self::AuthenticationMethod,
            0x16 => Self::AuthenticationData,
            0x17 => Self::RequestProblemInformation,
            0x18 => Self::WillDelayInterval,
            0x19 => Self::RequestResponseInformation,
            0x1a => Self::ResponseInformation,
            0x1c => Self::ServerReference,
            0x1f => Self::ReasonString,
            0x21 => Self::ReceiveMaximum,
            0x22 => Self::TopicAliasMaximum,
            0x23 => Self::TopicAlias,
            0x24 => Self::MaximumQoS,
            0x25 => Self::RetainAvailable,
            0x26 => Self::UserProperty,
            0x27 => Self::MaximumPacketSize,
            0x28 => Self::WildcardSubscriptionAvailable,
            0x29 => Self::SubscriptionIdentifierAvailable,
            0x2a => Self::SharedSubscriptionAvailable,
            _ => return Err(DecodeError::InvalidPropertyId),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Property {
    PayloadFormatIndicator(u8),
    MessageExpiryInterval(u32),
    ContentType(String),
    ResponseTopic(String),
    CorrelationData(Vec<u8>),
    SubscriptionIdentifier(usize),
    SessionExpiryInterval(u32),
    AssignedClientIdentifier(String),
    ServerKeepAlive(u16),
    AuthenticationMethod(String),
    AuthenticationData(Vec<u8>),
    RequestProblemInformation(bool),
    WillDelayInterval(u32),
    RequestResponseInformation(bool),
    ResponseInformation(String),
    ServerReference(String),
    ReasonString(String),
    ReceiveMaximum(u16),
    TopicAliasMaximum(u16),
    TopicAlias(u16),
    MaximumQoS(u8),
    RetainAvailable(bool),
    UserProperty(String, String),
    MaximumPacketSize(u32),
    WildcardSubscriptionAvailable(bool),
    SubscriptionIdentifierAvailable(bool),
    SharedSubscriptionAvailable(bool),
}

impl Property {
    #[must_use]
    pub const fn id(&self) -> PropertyId {
        match self {
            Self::PayloadFormatIndicator(_) => PropertyId::PayloadFormatIndicator,
            Self::MessageExpiryInterval(_) => PropertyId::MessageExpiryInterval,
            Self::ContentType(_) => PropertyId::ContentType,
            Self::ResponseTopic(_) => PropertyId::ResponseTopic,
            Self::CorrelationData(_) => PropertyId::CorrelationData,
            Self::SubscriptionIdentifier(_) => PropertyId::SubscriptionIdentifier,
            Self::SessionExpiryInterval(_) => PropertyId::SessionExpiryInterval,
            Self::AssignedClientIdentifier(_) => PropertyId::AssignedClientIdentifier,
            Self::ServerKeepAlive(_) => PropertyId::ServerKeepAlive,
            Self::AuthenticationMethod(_) => PropertyId::AuthenticationMethod,
            Self::AuthenticationData(_) => PropertyId::AuthenticationData,
            Self::RequestProblemInformation(_) => PropertyId::RequestProblemInformation,
            Self::WillDelayInterval(_) => PropertyId::WillDelayInterval,
            Self::RequestResponseInformation(_) => PropertyId::RequestResponseInformation,
            Self::ResponseInformation(_) => PropertyId::ResponseInformation,
            Self::ServerReference(_) => PropertyId::ServerReference,
            Self::ReasonString(_) => PropertyId::ReasonString,
            Self::ReceiveMaximum(_) => PropertyId::ReceiveMaximum,
            Self::TopicAliasMaximum(_) => PropertyId::TopicAliasMaximum,
            Self::TopicAlias(_) => PropertyId::TopicAlias,
            Self::MaximumQoS(_) => PropertyId::MaximumQoS,
            Self::RetainAvailable(_) => PropertyId::RetainAvailable,
            Self::UserProperty(_, _) => PropertyId::UserProperty,
            Self::MaximumPacketSize(_) => PropertyId::MaximumPacketSize,
            Self::WildcardSubscriptionAvailable(_) => PropertyId::WildcardSubscriptionAvailable,
            Self::SubscriptionIdentifierAvailable(_) => {
                PropertyId::SubscriptionIdentifierAvailable
            }
            Self::SharedSubscriptionAvailable(_) => PropertyId::SharedSubscriptionAvailable,
        }
    }

    #[must_use]
    pub const fn default_receive_maximum() -> u16 {
        u16::MAX
    }

    #[must_use]
    pub const fn default_topic_alias_maximum() -> u16 {
        0
    }

    #[must_use]
    pub const fn default_request_response_information() -> bool {
        false
    }

    #[must_use]
    pub const fn default_request_problem_information() -> bool {
        true
    }

    #[must_use]
    pub const fn default_will_delay_interval() -> u32 {
        0
    }

    fn decode_one(id: PropertyId, ba: &mut ByteArray) -> Result<Self, DecodeError> {
        Ok(match id {
            PropertyId::PayloadFormatIndicator => Self::PayloadFormatIndicator(ba.read_byte()?),
            PropertyId::MessageExpiryInterval => Self::MessageExpiryInterval(ba.read_u32()?),
            PropertyId::ContentType => Self::ContentType(ba.read_string_data()?),
            PropertyId::ResponseTopic => Self::ResponseTopic(ba.read_string_data()?),
            PropertyId::CorrelationData => Self::CorrelationData(ba.read_binary_data()?),
            PropertyId::SubscriptionIdentifier => {
                Self::SubscriptionIdentifier(VarInt::decode(ba)?.value())
            }
            PropertyId::SessionExpiryInterval => Self::SessionExpiryInterval(ba.read_u32()?),
            PropertyId::AssignedClientIdentifier => {
                Self::AssignedClientIdentifier(ba.read_string_data()?)
            }
            PropertyId::ServerKeepAlive => Self::ServerKeepAlive(ba.read_u16()?),
            PropertyId::AuthenticationMethod => Self::AuthenticationMethod(ba.read_string_data()?),
            PropertyId::AuthenticationData => Self::AuthenticationData(ba.read_binary_data()?),
            PropertyId::RequestProblemInformation => {
                Self::RequestProblemInformation(ba.read_byte()? != 0)
            }
            PropertyId::WillDelayInterval => Self::WillDelayInterval(ba.read_u32()?),
            PropertyId::RequestResponseInformation => {
                Self::RequestResponseInformation(ba.read_byte()? != 0)
            }
            PropertyId::ResponseInformation => Self::ResponseInformation(ba.read_string_data()?),
            PropertyId::ServerReference => Self::ServerReference(ba.read_string_data()?),
            PropertyId::ReasonString => Self::ReasonString(ba.read_string_data()?),
            PropertyId::ReceiveMaximum => Self::ReceiveMaximum(ba.read_u16()?),
            PropertyId::TopicAliasMaximum => Self::TopicAliasMaximum(ba.read_u16()?),
            PropertyId::TopicAlias => Self::TopicAlias(ba.read_u16()?),
            PropertyId::MaximumQoS => Self::MaximumQoS(ba.read_byte()?),
            PropertyId::RetainAvailable => Self::RetainAvailable(ba.read_byte()? != 0),
            PropertyId::UserProperty => {
                let name = ba.read_string_data()?;
                let value = ba.read_string_data()?;
                Self::UserProperty(name, value)
            }
            PropertyId::MaximumPacketSize => Self::MaximumPacketSize(ba.read_u32()?),
            PropertyId::WildcardSubscriptionAvailable => {
                Self::WildcardSubscriptionAvailable(ba.read_byte()? != 0)
            }
            PropertyId::SubscriptionIdentifierAvailable => {
                Self::SubscriptionIdentifierAvailable(ba.read_byte()? != 0)
            }
            PropertyId::SharedSubscriptionAvailable => {
                Self::SharedSubscriptionAvailable(ba.read_byte()? != 0)
            }
        })
    }

    fn encode_one(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Self::PayloadFormatIndicator(v) => buf.push(*v),
            Self::MessageExpiryInterval(v)
            | Self::WillDelayInterval(v)
            | Self::MaximumPacketSize(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::ContentType(s)
            | Self::ResponseTopic(s)
            | Self::AssignedClientIdentifier(s)
            | Self::AuthenticationMethod(s)
            | Self::ResponseInformation(s)
            | Self::ServerReference(s)
            | Self::ReasonString(s) => {
                byte_array::write_string_data(buf, s);
            }
            Self::CorrelationData(d) | Self::AuthenticationData(d) => {
                byte_array::write_binary_data(buf, d);
            }
            Self::SubscriptionIdentifier(v) => {
                VarInt::new(*v)?.encode(buf)?;
            }
            Self::SessionExpiryInterval(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::ServerKeepAlive(v)
            | Self::ReceiveMaximum(v)
            | Self::TopicAliasMaximum(v)
            | Self::TopicAlias(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::RequestProblemInformation(b)
            | Self::RequestResponseInformation(b)
            | Self::RetainAvailable(b)
            | Self::WildcardSubscriptionAvailable(b)
            | Self::SubscriptionIdentifierAvailable(b)
            | Self::SharedSubscriptionAvailable(b) => buf.push(u8::from(*b)),
            Self::MaximumQoS(v) => buf.push(*v),
            Self::UserProperty(name, value) => {
                byte_array::write_string_data(buf, name);
                byte_array::write_string_data(buf, value);
            }
        }
        Ok(())
    }
}

impl EncodePacket for Property {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let start = buf.len();
        let id: u8 = self.id().into();
        buf.push(id);
        self.encode_one(buf)?;
        Ok(buf.len() - start)
    }
}

/// A legality table: which property identifiers a given packet type may carry.
pub type PropertyTable = &'static [PropertyId];

/// The length-prefixed collection of properties in a packet's variable header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties(pub Vec<Property>);

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, property: Property) {
        self.0.push(property);
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.0.iter()
    }

    #[must_use]
    pub fn find(&self, id: PropertyId) -> Option<&Property> {
        self.0.iter().find(|p| p.id() == id)
    }

    /// Validates that every contained identifier is legal for `table`,
    /// rejecting the packet as Malformed otherwise.
    pub fn validate(&self, table: PropertyTable) -> Result<(), DecodeError> {
        for p in &self.0 {
            if !table.contains(&p.id()) {
                log::error!(
                    "[MQTT-2.2.2-1] property {:?} is not valid for this packet type",
                    p.id()
                );
                return Err(DecodeError::InvalidPropertyForPacket);
            }
        }
        Ok(())
    }

    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = VarInt::decode(ba)?.value();
        let start = ba.offset();
        let mut props = Vec::new();
        while ba.offset() - start < len {
            let id = PropertyId::try_from(ba.read_byte()?)?;
            props.push(Property::decode_one(id, ba)?);
        }
        Ok(Self(props))
    }
}

impl EncodePacket for Properties {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        for p in &self.0 {
            p.encode(&mut body)?;
        }
        let start = buf.len();
        VarInt::new(body.len())?.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_round_trip() {
        let mut props = Properties::new();
        props.push(Property::ReceiveMaximum(32));
        props.push(Property::UserProperty("k".into(), "v".into()));

        let mut buf = Vec::new();
        props.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = Properties::decode(&mut ba).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_empty_properties() {
        let props = Properties::new();
        let mut buf = Vec::new();
        props.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0]);
    }
}
