// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! MQTT 5.0 control packets.

mod ack;
mod auth;
mod connect;
mod connect_ack;
mod disconnect;
mod header;
mod packet;
mod ping;
mod property;
mod publish;
mod reason_code;
mod subscribe;
mod subscribe_ack;
mod unsubscribe;
mod unsubscribe_ack;

pub use ack::{
    PublishAckPacket, PublishCompletePacket, PublishReceivedPacket, PublishReleasePacket,
    PUBLISH_ACK_PROPERTIES, PUBLISH_ACK_REASONS, PUBLISH_COMPLETE_PROPERTIES,
    PUBLISH_COMPLETE_REASONS, PUBLISH_RECEIVED_PROPERTIES, PUBLISH_RECEIVED_REASONS,
    PUBLISH_RELEASE_PROPERTIES, PUBLISH_RELEASE_REASONS,
};
pub use auth::{AuthPacket, AUTH_PROPERTIES, AUTH_REASONS};
pub use connect::{ConnectPacket, LastWill, CONNECT_PROPERTIES, WILL_PROPERTIES};
pub use connect_ack::{ConnectAckPacket, CONNECT_ACK_PROPERTIES, CONNECT_REASONS};
pub use disconnect::{DisconnectPacket, DISCONNECT_PROPERTIES, DISCONNECT_REASONS};
pub use header::{FixedHeader, PacketType};
pub use packet::Packet;
pub use ping::{PingRequestPacket, PingResponsePacket};
pub use property::{Properties, Property, PropertyId, PropertyTable};
pub use publish::{PublishPacket, PUBLISH_PROPERTIES};
pub use reason_code::ReasonCode;
pub use subscribe::{RetainHandling, SubscribePacket, SubscribeTopic, SUBSCRIBE_PROPERTIES};
pub use subscribe_ack::{SubscribeAckPacket, SUBSCRIBE_ACK_PROPERTIES, SUBSCRIBE_REASONS};
pub use unsubscribe::{UnsubscribePacket, UNSUBSCRIBE_PROPERTIES};
pub use unsubscribe_ack::{UnsubscribeAckPacket, UNSUBSCRIBE_ACK_PROPERTIES, UNSUBSCRIBE_REASONS};
