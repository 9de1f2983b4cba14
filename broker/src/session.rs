// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-client session state: in-flight QoS bookkeeping, packet-id
//! allocation, topic aliases, and the will record.
//!
//! One `Session` lives for as long as its client-id is known to the broker:
//! a `cleanSession`/`cleanStart` client gets a fresh one on every CONNECT,
//! while a persistent client's `Session` survives across reconnects so
//! queued messages and in-flight QoS state can be redelivered.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use codec::{PacketId, QoS};

use crate::commands::{BrokerToSessionCmd, SessionSender};
use crate::types::ProtocolVersion;

const MAX_TOPIC_ALIAS_DEFAULT: u16 = 0;

#[derive(Debug, Clone)]
pub struct WillRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub delay_interval: u32,
}

/// The lifecycle state of a single outbound QoS > 0 delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundQos2State {
    /// PUBLISH sent, waiting for PUBREC.
    AwaitingPubRec,
    /// PUBREC received and PUBREL sent, waiting for PUBCOMP.
    AwaitingPubComp,
}

#[derive(Debug, Clone)]
pub struct PendingPublish {
    pub packet_id: PacketId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// An outbound QoS 2 delivery still running its handshake: the content to
/// resend with DUP=1 (or the bare PUBREL) if the client reconnects before
/// the handshake completes.
#[derive(Debug, Clone)]
pub struct InFlightQos2 {
    pub state: OutboundQos2State,
    pub publish: PendingPublish,
}

/// An inbound QoS 2 PUBLISH held until the matching PUBREL arrives, so a
/// duplicate PUBLISH retried before then does not reach subscribers twice.
#[derive(Debug, Clone)]
pub struct PendingInboundPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub message_expiry_interval: Option<u32>,
    pub received_at: Instant,
}

#[derive(Debug)]
pub struct Session {
    pub client_id: String,
    pub protocol_version: ProtocolVersion,
    pub clean_session: bool,
    pub keep_alive_secs: u16,
    pub last_seen: Instant,

    pub sender: Option<SessionSender>,

    /// Outbound messages queued while the client is offline (persistent
    /// sessions only), delivered in order on reconnect.
    pub backlog: VecDeque<PendingPublish>,
    /// QoS 1 publishes sent but not yet PUBACKed, keyed by packet id, kept
    /// so a reconnect can resend them with DUP=1.
    pub in_flight_qos1: std::collections::HashMap<PacketId, PendingPublish>,
    /// QoS 2 publishes in flight, keyed by packet id.
    pub in_flight_qos2: std::collections::HashMap<PacketId, InFlightQos2>,
    /// Inbound QoS 2 PUBLISHes received but not yet released via PUBREL,
    /// keyed by packet id. A retried PUBLISH for an id already here just
    /// gets its PUBREC resent, with no second publish into the broker.
    pub inbound_qos2_pending: std::collections::HashMap<PacketId, PendingInboundPublish>,

    next_packet_id: PacketId,
    receive_maximum: u16,

    /// Broker -> client topic alias table, bounded by the peer's
    /// TopicAliasMaximum; oldest alias is evicted first.
    outgoing_aliases: VecDeque<(u16, String)>,
    outgoing_alias_max: u16,

    pub will: Option<WillRecord>,
    pub will_delay_deadline: Option<Instant>,

    pub session_expiry_interval: u32,
}

impl Session {
    #[must_use]
    pub fn new(
        client_id: String,
        protocol_version: ProtocolVersion,
        clean_session: bool,
        keep_alive_secs: u16,
    ) -> Self {
        Self {
            client_id,
            protocol_version,
            clean_session,
            keep_alive_secs,
            last_seen: Instant::now(),
            sender: None,
            backlog: VecDeque::new(),
            in_flight_qos1: std::collections::HashMap::new(),
            in_flight_qos2: std::collections::HashMap::new(),
            inbound_qos2_pending: std::collections::HashMap::new(),
            next_packet_id: 1,
            receive_maximum: u16::MAX,
            outgoing_aliases: VecDeque::new(),
            outgoing_alias_max: MAX_TOPIC_ALIAS_DEFAULT,
            will: None,
            will_delay_deadline: None,
            session_expiry_interval: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// 1.5x the keep-alive interval [MQTT-3.1.2-24]. `None` means no
    /// keep-alive timeout applies (keep_alive == 0).
    #[must_use]
    pub fn keep_alive_deadline(&self) -> Option<Duration> {
        if self.keep_alive_secs == 0 {
            None
        } else {
            Some(Duration::from_millis(u64::from(self.keep_alive_secs) * 1500))
        }
    }

    #[must_use]
    pub fn is_keep_alive_expired(&self) -> bool {
        match self.keep_alive_deadline() {
            Some(deadline) => self.last_seen.elapsed() > deadline,
            None => false,
        }
    }

    /// Allocates the next unused packet id, skipping ones still in flight
    /// and wrapping from 65535 back to 1 (0 is reserved).
    pub fn allocate_packet_id(&mut self) -> Option<PacketId> {
        if self.in_flight_qos1.len() + self.in_flight_qos2.len() >= usize::from(self.receive_maximum) {
            return None;
        }
        let start = self.next_packet_id;
        loop {
            let candidate = self.next_packet_id;
            self.next_packet_id = if self.next_packet_id == u16::MAX {
                1
            } else {
                self.next_packet_id + 1
            };
            if !self.in_flight_qos1.contains_key(&candidate) && !self.in_flight_qos2.contains_key(&candidate) {
                return Some(candidate);
            }
            if self.next_packet_id == start {
                return None;
            }
        }
    }

    pub fn set_receive_maximum(&mut self, receive_maximum: u16) {
        self.receive_maximum = receive_maximum.max(1);
    }

    pub fn set_outgoing_alias_max(&mut self, max: u16) {
        self.outgoing_alias_max = max;
    }

    /// Returns the alias already assigned to `topic`, or allocates a new
    /// one if the peer's TopicAliasMaximum allows it.
    pub fn resolve_outgoing_alias(&mut self, topic: &str) -> Option<u16> {
        if self.outgoing_alias_max == 0 {
            return None;
        }
        if let Some((alias, _)) = self.outgoing_aliases.iter().find(|(_, t)| t == topic) {
            return Some(*alias);
        }
        let alias = if self.outgoing_aliases.len() < usize::from(self.outgoing_alias_max) {
            u16::try_from(self.outgoing_aliases.len() + 1).unwrap_or(1)
        } else {
            let (oldest_alias, _) = self.outgoing_aliases.pop_front()?;
            oldest_alias
        };
        self.outgoing_aliases.push_back((alias, topic.to_string()));
        Some(alias)
    }

    pub async fn deliver(&mut self, cmd: BrokerToSessionCmd) -> Result<(), crate::error::Error> {
        match &self.sender {
            Some(sender) => Ok(sender.send(cmd).await?),
            None => Err(crate::error::Error::new(
                crate::error::ErrorKind::SessionNotFound,
                "session has no active connection",
            )),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> Session {
        Session::new("client-1".to_string(), ProtocolVersion::V311, true, 60)
    }

    #[test]
    fn test_packet_id_allocation_skips_in_flight() {
        let mut session = new_session();
        let first = session.allocate_packet_id().unwrap();
        session.in_flight_qos1.insert(
            first,
            PendingPublish {
                packet_id: first,
                topic: "t".to_string(),
                payload: Vec::new(),
                qos: QoS::AtLeastOnce,
                retain: false,
            },
        );
        let second = session.allocate_packet_id().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_packet_id_wraps_from_max_to_one() {
        let mut session = new_session();
        session.next_packet_id = u16::MAX;
        let a = session.allocate_packet_id().unwrap();
        assert_eq!(a, u16::MAX);
        let b = session.allocate_packet_id().unwrap();
        assert_eq!(b, 1);
    }

    #[test]
    fn test_keep_alive_deadline_is_1_5x() {
        let session = Session::new("c".to_string(), ProtocolVersion::V311, true, 10);
        assert_eq!(session.keep_alive_deadline(), Some(Duration::from_millis(15000)));
    }

    #[test]
    fn test_keep_alive_zero_means_no_timeout() {
        let session = Session::new("c".to_string(), ProtocolVersion::V311, true, 0);
        assert_eq!(session.keep_alive_deadline(), None);
    }

    #[test]
    fn test_outgoing_alias_reuses_existing_mapping() {
        let mut session = new_session();
        session.set_outgoing_alias_max(2);
        let a1 = session.resolve_outgoing_alias("a/b").unwrap();
        let a2 = session.resolve_outgoing_alias("a/b").unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_outgoing_alias_evicts_oldest_when_full() {
        let mut session = new_session();
        session.set_outgoing_alias_max(1);
        let first = session.resolve_outgoing_alias("a/b").unwrap();
        let second = session.resolve_outgoing_alias("c/d").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_receive_maximum_bounds_in_flight_allocation() {
        let mut session = new_session();
        session.set_receive_maximum(1);
        let id = session.allocate_packet_id().unwrap();
        session.in_flight_qos1.insert(
            id,
            PendingPublish {
                packet_id: id,
                topic: "t".to_string(),
                payload: Vec::new(),
                qos: QoS::AtLeastOnce,
                retain: false,
            },
        );
        assert!(session.allocate_packet_id().is_none());
    }
}
