// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! MQTT 3.1.1 control packets.

mod connect;
mod connect_ack;
mod header;
mod packet;
mod ping_disconnect;
mod publish;
mod simple_ack;
mod subscribe;
mod subscribe_ack;
mod unsubscribe;
mod unsubscribe_ack;

pub use connect::{ConnectPacket, LastWill};
pub use connect_ack::{ConnectAckPacket, ConnectReturnCode};
pub use header::{FixedHeader, PacketType};
pub use packet::Packet;
pub use ping_disconnect::{DisconnectPacket, PingRequestPacket, PingResponsePacket};
pub use publish::PublishPacket;
pub use simple_ack::{
    PublishAckPacket, PublishCompletePacket, PublishReceivedPacket, PublishReleasePacket,
};
pub use subscribe::{SubscribePacket, SubscribeTopic};
pub use subscribe_ack::{SubscribeAck, SubscribeAckPacket};
pub use unsubscribe::UnsubscribePacket;
pub use unsubscribe_ack::UnsubscribeAckPacket;
