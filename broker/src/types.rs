// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

pub type SessionId = u64;
pub type ListenerId = u32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtocolVersion {
    #[default]
    V311,
    V5,
}

impl From<codec::ProtocolLevel> for ProtocolVersion {
    fn from(level: codec::ProtocolLevel) -> Self {
        match level {
            codec::ProtocolLevel::V311 => Self::V311,
            codec::ProtocolLevel::V5 => Self::V5,
        }
    }
}
