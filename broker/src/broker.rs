// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The broker core: client table, subscription routing, retained store and
//! will delivery, all guarded by one lock per §5 of the design notes.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use codec::{PacketId, QoS};

use crate::commands::{BrokerToSessionCmd, OutgoingPacket};
use crate::config::Config;
use crate::session::{InFlightQos2, OutboundQos2State, PendingPublish, Session, WillRecord};
use crate::subscription::{effective_qos, SubscriptionEngine};
use crate::types::ProtocolVersion;

pub struct ConnectOutcome {
    pub session_present: bool,
    pub assigned_client_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub from_client_id: Option<String>,
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub message_expiry_interval: Option<u32>,
    pub received_at: Instant,
}

pub struct Broker {
    pub config: Config,
    sessions: HashMap<String, Session>,
    subscriptions: SubscriptionEngine,
    /// client ids with an armed, not-yet-fired will, its fire deadline and
    /// the will content itself, since a clean-session client's `Session` is
    /// gone by the time the deadline elapses.
    will_pending: HashMap<String, (Instant, WillRecord)>,
}

impl Broker {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            subscriptions: SubscriptionEngine::new(),
            will_pending: HashMap::new(),
        }
    }

    #[must_use]
    pub fn session(&self, client_id: &str) -> Option<&Session> {
        self.sessions.get(client_id)
    }

    #[must_use]
    pub fn session_mut(&mut self, client_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(client_id)
    }

    /// Registers (or resumes) a session for `client_id`. If the client was
    /// already connected under a different socket, that socket is told to
    /// close first so exactly one connection survives per client id.
    pub async fn connect(
        &mut self,
        client_id: &str,
        protocol_version: ProtocolVersion,
        clean_start: bool,
        keep_alive_secs: u16,
        sender: crate::commands::SessionSender,
    ) -> ConnectOutcome {
        self.will_pending.remove(client_id);

        if let Some(existing) = self.sessions.get_mut(client_id) {
            if existing.is_connected() {
                if let Some(old_sender) = existing.sender.take() {
                    let _ = old_sender
                        .send(BrokerToSessionCmd::Kick("Session taken over".to_string()))
                        .await;
                }
            }
            if clean_start {
                self.subscriptions.remove_session_by_client(client_id);
                *existing = Session::new(
                    client_id.to_string(),
                    protocol_version,
                    clean_start,
                    keep_alive_secs,
                );
                existing.sender = Some(sender);
                return ConnectOutcome {
                    session_present: false,
                    assigned_client_id: None,
                };
            }
            existing.sender = Some(sender);
            existing.protocol_version = protocol_version;
            existing.keep_alive_secs = keep_alive_secs;
            existing.touch();
            self.resend_in_flight(client_id).await;
            self.flush_backlog(client_id).await;
            return ConnectOutcome {
                session_present: true,
                assigned_client_id: None,
            };
        }

        let mut session = Session::new(
            client_id.to_string(),
            protocol_version,
            clean_start,
            keep_alive_secs,
        );
        session.sender = Some(sender);
        self.sessions.insert(client_id.to_string(), session);
        ConnectOutcome {
            session_present: false,
            assigned_client_id: None,
        }
    }

    /// Delivers every message queued while `client_id` was offline, in the
    /// order it was queued, now that it has a live connection again.
    async fn flush_backlog(&mut self, client_id: &str) {
        let pending: Vec<PendingPublish> = self
            .sessions
            .get_mut(client_id)
            .map(|s| s.backlog.drain(..).collect())
            .unwrap_or_default();

        for item in pending {
            self.deliver_publish(client_id, &item.topic, &item.payload, item.qos, item.retain)
                .await;
        }
    }

    /// Resends every publish still in `client_id`'s in-flight window with
    /// DUP=1, and a bare PUBREL for any QoS 2 exchange already past PUBREC,
    /// so a reconnecting persistent session picks its handshakes back up
    /// instead of losing them.
    async fn resend_in_flight(&mut self, client_id: &str) {
        let Some(session) = self.sessions.get_mut(client_id) else {
            return;
        };
        if !session.is_connected() {
            return;
        }

        let protocol_version = session.protocol_version;
        let qos1: Vec<PendingPublish> = session.in_flight_qos1.values().cloned().collect();
        let qos2: Vec<InFlightQos2> = session.in_flight_qos2.values().cloned().collect();

        for publish in qos1 {
            let outgoing = dup_publish_packet(protocol_version, &publish);
            if let Err(err) = session.deliver(BrokerToSessionCmd::Packet(outgoing)).await {
                log::warn!("dropping resend to {}: {}", client_id, err);
            }
        }

        for entry in qos2 {
            match entry.state {
                OutboundQos2State::AwaitingPubRec => {
                    let outgoing = dup_publish_packet(protocol_version, &entry.publish);
                    if let Err(err) = session.deliver(BrokerToSessionCmd::Packet(outgoing)).await {
                        log::warn!("dropping resend to {}: {}", client_id, err);
                    }
                }
                OutboundQos2State::AwaitingPubComp => {
                    let outgoing = match protocol_version {
                        ProtocolVersion::V311 => {
                            OutgoingPacket::V3(codec::v3::Packet::PublishRelease(
                                codec::v3::PublishReleasePacket {
                                    packet_id: entry.publish.packet_id,
                                },
                            ))
                        }
                        ProtocolVersion::V5 => OutgoingPacket::V5(codec::v5::Packet::PublishRelease(
                            codec::v5::PublishReleasePacket {
                                packet_id: entry.publish.packet_id,
                                reason_code: codec::v5::ReasonCode::Success,
                                properties: codec::v5::Properties::new(),
                            },
                        )),
                    };
                    if let Err(err) = session.deliver(BrokerToSessionCmd::Packet(outgoing)).await {
                        log::warn!("dropping resend to {}: {}", client_id, err);
                    }
                }
            }
        }
    }

    pub fn set_will(&mut self, client_id: &str, will: WillRecord) {
        if let Some(session) = self.sessions.get_mut(client_id) {
            session.will = Some(will);
        }
    }

    pub fn subscribe(
        &mut self,
        client_id: &str,
        filter: &str,
        qos: QoS,
        no_local: bool,
        retain_as_published: bool,
        retain_handling_always: bool,
        retain_handling_never: bool,
    ) -> Vec<(String, QoS, Vec<u8>)> {
        let is_fresh = self
            .subscriptions
            .matching_subscribers(filter)
            .iter()
            .all(|s| s.session_id != client_hash(client_id));

        self.subscriptions.subscribe(
            client_hash(client_id),
            filter,
            qos,
            no_local,
            retain_as_published,
        );

        if retain_handling_never || (!retain_handling_always && !is_fresh) {
            return Vec::new();
        }

        self.subscriptions
            .retained_matching(filter)
            .into_iter()
            .map(|m| {
                let delivered = effective_qos(m.qos, qos);
                (m.topic.clone(), delivered, m.payload.clone())
            })
            .collect()
    }

    pub fn unsubscribe(&mut self, client_id: &str, filter: &str) -> bool {
        let had = !self
            .subscriptions
            .matching_subscribers(filter)
            .iter()
            .filter(|s| s.session_id == client_hash(client_id))
            .collect::<Vec<_>>()
            .is_empty();
        self.subscriptions.unsubscribe(client_hash(client_id), filter);
        had
    }

    /// Routes a publish to every matching subscriber, applying shared-group
    /// selection, QoS downgrade and message-expiry decrement. Returns the
    /// number of sessions the publish was handed to (for test assertions).
    pub async fn publish(&mut self, request: PublishRequest) -> usize {
        if let Some(expiry) = request.message_expiry_interval {
            let elapsed = request.received_at.elapsed().as_secs();
            if elapsed >= u64::from(expiry) {
                return 0;
            }
        }

        if request.retain {
            self.subscriptions
                .set_retained(&request.topic, request.qos, request.payload.clone());
        }

        let subscribers = self.subscriptions.matching_subscribers(&request.topic);
        let mut delivered_to: HashSet<u64> = HashSet::new();
        let mut count = 0;

        for subscription in subscribers {
            if subscription.no_local {
                if let Some(from) = &request.from_client_id {
                    if client_hash(from) == subscription.session_id {
                        continue;
                    }
                }
            }
            if !delivered_to.insert(subscription.session_id) {
                continue;
            }

            let delivered_qos = effective_qos(request.qos, subscription.qos);
            let Some(client_id) = self.client_id_for_hash(subscription.session_id) else {
                continue;
            };

            self.deliver_publish(
                &client_id,
                &request.topic,
                &request.payload,
                delivered_qos,
                subscription.retain_as_published && request.retain,
            )
            .await;
            count += 1;
        }

        count
    }

    /// Allocates a packet id for a retained message replayed straight into a
    /// SUBACK reply (rather than through `publish()`/`deliver_publish`) and
    /// registers it as in flight, the same bookkeeping a routed delivery
    /// gets, so its PUBACK/PUBREC is matched and it can be resent on
    /// reconnect like any other in-flight publish.
    pub fn register_retained_delivery(
        &mut self,
        client_id: &str,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Option<PacketId> {
        let session = self.sessions.get_mut(client_id)?;
        if qos == QoS::AtMostOnce {
            return None;
        }
        let packet_id = session.allocate_packet_id()?;
        let pending = PendingPublish {
            packet_id,
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain: true,
        };
        if qos == QoS::AtLeastOnce {
            session.in_flight_qos1.insert(packet_id, pending);
        } else {
            session.in_flight_qos2.insert(
                packet_id,
                InFlightQos2 {
                    state: OutboundQos2State::AwaitingPubRec,
                    publish: pending,
                },
            );
        }
        Some(packet_id)
    }

    async fn deliver_publish(
        &mut self,
        client_id: &str,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) {
        let Some(session) = self.sessions.get_mut(client_id) else {
            return;
        };

        if !session.is_connected() {
            session.backlog.push_back(PendingPublish {
                packet_id: 0,
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
                retain,
            });
            return;
        }

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            session.allocate_packet_id()
        };

        let outgoing = match session.protocol_version {
            ProtocolVersion::V311 => OutgoingPacket::V3(codec::v3::Packet::Publish(
                codec::v3::PublishPacket {
                    dup: false,
                    qos,
                    retain,
                    topic: topic.to_string(),
                    packet_id,
                    payload: payload.to_vec(),
                },
            )),
            ProtocolVersion::V5 => OutgoingPacket::V5(codec::v5::Packet::Publish(
                codec::v5::PublishPacket {
                    dup: false,
                    qos,
                    retain,
                    topic: topic.to_string(),
                    packet_id,
                    properties: codec::v5::Properties::new(),
                    payload: payload.to_vec(),
                },
            )),
        };

        if let Some(id) = packet_id {
            let pending = PendingPublish {
                packet_id: id,
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
                retain,
            };
            if qos == QoS::AtLeastOnce {
                session.in_flight_qos1.insert(id, pending);
            } else if qos == QoS::ExactlyOnce {
                session.in_flight_qos2.insert(
                    id,
                    InFlightQos2 {
                        state: OutboundQos2State::AwaitingPubRec,
                        publish: pending,
                    },
                );
            }
        }

        if let Err(err) = session.deliver(BrokerToSessionCmd::Packet(outgoing)).await {
            log::warn!("dropping publish to {}: {}", client_id, err);
        }
    }

    /// Arms or fires the will for a disconnecting client, per the
    /// session-expiry / will-delay interaction in the broker core design.
    pub fn disconnect(&mut self, client_id: &str, send_will: bool, session_expiry_interval: u32) {
        if let Some(session) = self.sessions.get_mut(client_id) {
            session.sender = None;
            session.session_expiry_interval = session_expiry_interval;

            if send_will {
                if let Some(will) = session.will.take() {
                    let delay = will.delay_interval.min(session_expiry_interval);
                    let deadline = Instant::now() + Duration::from_secs(u64::from(delay));
                    session.will_delay_deadline = Some(deadline);
                    self.will_pending
                        .insert(client_id.to_string(), (deadline, will));
                }
            } else {
                session.will = None;
            }

            if session.clean_session {
                self.subscriptions.remove_session_by_client(client_id);
                self.sessions.remove(client_id);
            }
        }
    }

    /// Runs one tick of the 1 Hz sweeper: fires due wills and expires
    /// sessions whose `sessionExpiryInterval` has elapsed.
    pub async fn sweep(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .will_pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for client_id in due {
            let Some((_, will)) = self.will_pending.remove(&client_id) else {
                continue;
            };
            if let Some(session) = self.sessions.get_mut(&client_id) {
                session.will = None;
                session.will_delay_deadline = None;
            }
            self.publish(PublishRequest {
                from_client_id: Some(client_id),
                topic: will.topic,
                payload: will.payload,
                qos: will.qos,
                retain: will.retain,
                message_expiry_interval: None,
                received_at: Instant::now(),
            })
            .await;
        }

        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| {
                !s.is_connected()
                    && s.session_expiry_interval > 0
                    && s.last_seen.elapsed().as_secs() >= u64::from(s.session_expiry_interval)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for client_id in expired {
            self.subscriptions.remove_session_by_client(&client_id);
            self.sessions.remove(&client_id);
        }
    }

    fn client_id_for_hash(&self, hash: u64) -> Option<String> {
        self.sessions
            .keys()
            .find(|id| client_hash(id) == hash)
            .cloned()
    }
}

/// Rebuilds the outgoing PUBLISH for an in-flight entry with DUP=1, for
/// resend on reconnect.
fn dup_publish_packet(protocol_version: ProtocolVersion, publish: &PendingPublish) -> OutgoingPacket {
    match protocol_version {
        ProtocolVersion::V311 => OutgoingPacket::V3(codec::v3::Packet::Publish(codec::v3::PublishPacket {
            dup: true,
            qos: publish.qos,
            retain: publish.retain,
            topic: publish.topic.clone(),
            packet_id: Some(publish.packet_id),
            payload: publish.payload.clone(),
        })),
        ProtocolVersion::V5 => OutgoingPacket::V5(codec::v5::Packet::Publish(codec::v5::PublishPacket {
            dup: true,
            qos: publish.qos,
            retain: publish.retain,
            topic: publish.topic.clone(),
            packet_id: Some(publish.packet_id),
            properties: codec::v5::Properties::new(),
            payload: publish.payload.clone(),
        })),
    }
}

/// `SubscriptionEngine` is keyed by an opaque `SessionId`; client ids are
/// hashed into that space so the engine does not need to know about string
/// identities at all.
fn client_hash(client_id: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    client_id.hash(&mut hasher);
    hasher.finish()
}

impl SubscriptionEngine {
    pub fn remove_session_by_client(&mut self, client_id: &str) {
        self.remove_session(client_hash(client_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_config() -> Config {
        Config::default()
    }

    #[tokio::test]
    async fn test_connect_new_client_has_no_session_present() {
        let mut broker = Broker::new(test_config());
        let (tx, _rx) = mpsc::channel(8);
        let outcome = broker
            .connect("client-a", ProtocolVersion::V311, true, 60, tx)
            .await;
        assert!(!outcome.session_present);
    }

    #[tokio::test]
    async fn test_reconnect_non_clean_preserves_session_present() {
        let mut broker = Broker::new(test_config());
        let (tx1, _rx1) = mpsc::channel(8);
        broker
            .connect("client-a", ProtocolVersion::V311, false, 60, tx1)
            .await;
        broker.disconnect("client-a", false, 3600);

        let (tx2, _rx2) = mpsc::channel(8);
        let outcome = broker
            .connect("client-a", ProtocolVersion::V311, false, 60, tx2)
            .await;
        assert!(outcome.session_present);
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscriber() {
        let mut broker = Broker::new(test_config());
        let (tx, mut rx) = mpsc::channel(8);
        broker
            .connect("subscriber", ProtocolVersion::V311, true, 60, tx)
            .await;
        broker.subscribe("subscriber", "a/b", QoS::AtMostOnce, false, false, false, false);

        let delivered = broker
            .publish(PublishRequest {
                from_client_id: None,
                topic: "a/b".to_string(),
                payload: b"hi".to_vec(),
                qos: QoS::AtMostOnce,
                retain: false,
                message_expiry_interval: None,
                received_at: Instant::now(),
            })
            .await;
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_offline_subscriber_gets_backlog_entry() {
        let mut broker = Broker::new(test_config());
        let (tx, _rx) = mpsc::channel(8);
        broker
            .connect("offline", ProtocolVersion::V311, false, 60, tx)
            .await;
        broker.subscribe("offline", "a/b", QoS::AtLeastOnce, false, false, false, false);
        broker.disconnect("offline", false, 3600);

        broker
            .publish(PublishRequest {
                from_client_id: None,
                topic: "a/b".to_string(),
                payload: b"queued".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: false,
                message_expiry_interval: None,
                received_at: Instant::now(),
            })
            .await;

        let session = broker.session("offline").unwrap();
        assert_eq!(session.backlog.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_resends_in_flight_qos1_with_dup() {
        let mut broker = Broker::new(test_config());
        let (tx1, mut rx1) = mpsc::channel(8);
        broker
            .connect("c1", ProtocolVersion::V311, false, 60, tx1)
            .await;
        broker.subscribe("c1", "a/b", QoS::AtLeastOnce, false, false, false, false);

        broker
            .publish(PublishRequest {
                from_client_id: None,
                topic: "a/b".to_string(),
                payload: b"hi".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: false,
                message_expiry_interval: None,
                received_at: Instant::now(),
            })
            .await;
        // Delivered once live, left un-acked.
        assert!(rx1.try_recv().is_ok());

        broker.disconnect("c1", false, 3600);

        let (tx2, mut rx2) = mpsc::channel(8);
        broker
            .connect("c1", ProtocolVersion::V311, false, 60, tx2)
            .await;

        match rx2.try_recv() {
            Ok(BrokerToSessionCmd::Packet(OutgoingPacket::V3(codec::v3::Packet::Publish(p)))) => {
                assert!(p.dup);
                assert_eq!(p.topic, "a/b");
            }
            other => panic!("expected resent Publish, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_retained_replay_on_subscribe() {
        let mut broker = Broker::new(test_config());
        broker
            .publish(PublishRequest {
                from_client_id: None,
                topic: "a/b".to_string(),
                payload: b"retained".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: true,
                message_expiry_interval: None,
                received_at: Instant::now(),
            })
            .await;

        let (tx, _rx) = mpsc::channel(8);
        broker
            .connect("late", ProtocolVersion::V311, true, 60, tx)
            .await;
        let replay = broker.subscribe("late", "a/+", QoS::AtLeastOnce, false, false, false, false);
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].0, "a/b");
    }
}
