// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::ProtocolLevel;

use super::header::{FixedHeader, PacketType};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectPacket {
    pub protocol_level: ProtocolLevel,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl Default for ConnectPacket {
    fn default() -> Self {
        Self {
            protocol_level: ProtocolLevel::V311,
            clean_session: true,
            keep_alive: 60,
            client_id: String::new(),
            will: None,
            username: None,
            password: None,
        }
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;

        let protocol_name = ba.read_string_data()?;
        if protocol_name != "MQTT" {
            log::error!("[MQTT-3.1.2-1] invalid protocol name: {}", protocol_name);
            return Err(DecodeError::InvalidProtocolName);
        }

        let protocol_level = ProtocolLevel::try_from(ba.read_byte()?)?;

        let connect_flags = ba.read_byte()?;
        if connect_flags & 0b0000_0001 != 0 {
            log::error!("[MQTT-3.1.2-3] reserved connect flag bit must be 0");
            return Err(DecodeError::InvalidConnectFlags);
        }
        let clean_session = connect_flags & 0b0000_0010 != 0;
        let will_flag = connect_flags & 0b0000_0100 != 0;
        let will_qos_bits = (connect_flags & 0b0001_1000) >> 3;
        let will_retain = connect_flags & 0b0010_0000 != 0;
        let password_flag = connect_flags & 0b0100_0000 != 0;
        let username_flag = connect_flags & 0b1000_0000 != 0;

        if !will_flag && (will_qos_bits != 0 || will_retain) {
            log::error!("[MQTT-3.1.2-11] will QoS/retain set without will flag");
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = ba.read_u16()?;
        let client_id = ba.read_string_data()?;

        let will = if will_flag {
            let topic = ba.read_string_data()?;
            let message = ba.read_binary_data()?;
            let qos = QoS::try_from(will_qos_bits)?;
            Some(LastWill {
                topic,
                message,
                qos,
                retain: will_retain,
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

        if client_id.is_empty() && !clean_session {
            log::error!("[MQTT-3.1.3-8] empty client id requires clean session");
            return Err(DecodeError::InvalidClientId);
        }

        Ok(Self {
            protocol_level,
            clean_session,
            keep_alive,
            client_id,
            will,
            username,
            password,
        })
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        byte_array::write_string_data(&mut body, "MQTT");
        body.push(self.protocol_level.into());

        let mut flags: u8 = 0;
        if self.clean_session {
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
        byte_array::write_string_data(&mut body, &self.client_id);

        if let Some(will) = &self.will {
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
