// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// Wire codec for MQTT 3.1.1 and MQTT 5.0 control packets.

mod base;
mod byte_array;
mod consts;
mod error;
mod qos;
mod topic;
mod utils;
mod var_int;

pub mod v3;
pub mod v5;

pub use base::{DecodePacket, EncodePacket};
pub use byte_array::{ByteArray, ByteArrayError};
pub use consts::MAX_PACKET_LEN;
pub use error::{DecodeError, EncodeError};
pub use qos::QoS;
pub use topic::{matches, validate_pub_topic, validate_sub_topic, Topic, TopicError};
pub use utils::random_client_id;
pub use var_int::VarInt;

/// Client/server agreed protocol revision, carried in the CONNECT variable header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtocolLevel {
    #[default]
    V311,
    V5,
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            4 => Ok(Self::V311),
            5 => Ok(Self::V5),
            level => {
                log::error!("[MQTT-3.1.2-2] Unsupported protocol level: {}", level);
                Err(DecodeError::InvalidProtocolLevel)
            }
        }
    }
}

impl From<ProtocolLevel> for u8 {
    fn from(level: ProtocolLevel) -> u8 {
        match level {
            ProtocolLevel::V311 => 4,
            ProtocolLevel::V5 => 5,
        }
    }
}

/// A packet identifier, unique among in-flight QoS 1/2 exchanges for one client.
pub type PacketId = u16;
