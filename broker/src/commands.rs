// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Command channels connecting connection tasks to the broker core.
//!
//! The listener/dispatcher/cache actor graph of the ancestor codebase
//! collapses here into two directions: each connection task owns a
//! `SessionToBrokerCmd` sender shared by the broker core, and the broker
//! core owns one `BrokerToSessionCmd` sender per session so outbound
//! packets for that client stay strictly ordered.

use tokio::sync::mpsc;

use codec::v3;
use codec::v5;

use crate::error::convert_send_error;
use crate::types::SessionId;

/// A packet to be written to the wire, tagged with the protocol version
/// the session negotiated at CONNECT time.
#[derive(Debug, Clone)]
pub enum OutgoingPacket {
    V3(v3::Packet),
    V5(v5::Packet),
}

#[derive(Debug, Clone)]
pub enum SessionToBrokerCmd {
    Connect(SessionId, ConnectRequest),
    Publish(SessionId, PublishRequest),
    PublishAck(SessionId, v5::PublishAckPacket),
    PublishReceived(SessionId, v5::PublishReceivedPacket),
    PublishRelease(SessionId, v5::PublishReleasePacket),
    PublishComplete(SessionId, v5::PublishCompletePacket),
    Subscribe(SessionId, SubscribeRequest),
    Unsubscribe(SessionId, UnsubscribeRequest),
    PingRequest(SessionId),
    Disconnect(SessionId),
}

#[derive(Debug, Clone)]
pub enum ConnectRequest {
    V3(v3::ConnectPacket),
    V5(v5::ConnectPacket),
}

#[derive(Debug, Clone)]
pub enum PublishRequest {
    V3(v3::PublishPacket),
    V5(v5::PublishPacket),
}

#[derive(Debug, Clone)]
pub enum SubscribeRequest {
    V3(v3::SubscribePacket),
    V5(v5::SubscribePacket),
}

#[derive(Debug, Clone)]
pub enum UnsubscribeRequest {
    V3(v3::UnsubscribePacket),
    V5(v5::UnsubscribePacket),
}

#[derive(Debug, Clone)]
pub enum BrokerToSessionCmd {
    /// A packet queued for delivery to this session's socket.
    Packet(OutgoingPacket),
    /// The broker is closing this session (duplicate client-id takeover,
    /// administrative kick, or a protocol violation noticed out-of-band).
    Kick(String),
}

pub type BrokerSender = mpsc::Sender<SessionToBrokerCmd>;
pub type BrokerReceiver = mpsc::Receiver<SessionToBrokerCmd>;
pub type SessionSender = mpsc::Sender<BrokerToSessionCmd>;
pub type SessionReceiver = mpsc::Receiver<BrokerToSessionCmd>;

convert_send_error!(SessionToBrokerCmd);
convert_send_error!(BrokerToSessionCmd);
