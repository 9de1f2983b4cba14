// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Subscription engine and retained-message store.
//!
//! Topic matching itself (wildcards, `$`-prefix exclusion, `$share/` group
//! parsing) lives in `codec::topic`; this module keeps the per-broker state
//! built on top of it: which sessions are subscribed to which filters, the
//! shared-subscription group membership used for round-robin delivery, and
//! the single retained message kept per topic name.

use std::collections::HashMap;

use rand::Rng;

use codec::{QoS, Topic};

use crate::types::SessionId;

#[derive(Debug, Clone)]
pub struct Subscription {
    pub session_id: SessionId,
    pub filter: String,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
}

#[derive(Debug, Clone)]
pub struct RetainedMessage {
    pub topic: String,
    pub qos: QoS,
    pub payload: Vec<u8>,
}

/// Tracks subscriptions and retained messages for the whole broker.
///
/// Plain filters and shared-subscription filters (`$share/<group>/...`) are
/// kept in separate maps because matching a publish against them follows
/// different fan-out rules: every plain subscriber gets a copy, but only one
/// member of each shared group does.
///
/// `plain` and `sys` are a further split of the non-shared list by whether
/// the filter's first level starts with `$`. A publish to a `$`-prefixed
/// topic (e.g. `$SYS/broker/uptime`) is matched only against `sys`, and a
/// publish to an ordinary topic only against `plain` — this mirrors the
/// original broker keeping its `$SYS` subscriber list fully separate from
/// the regular one rather than filtering a shared list on every publish.
#[derive(Debug, Default)]
pub struct SubscriptionEngine {
    plain: Vec<Subscription>,
    /// Subscriptions whose filter's first level starts with `$`.
    sys: Vec<Subscription>,
    /// group name -> filter -> member subscriptions.
    shared: HashMap<String, HashMap<String, Vec<Subscription>>>,
    retained: HashMap<String, RetainedMessage>,
}

fn is_sys_filter(filter: &str) -> bool {
    filter.starts_with('$')
}

impl SubscriptionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        session_id: SessionId,
        filter: &str,
        qos: QoS,
        no_local: bool,
        retain_as_published: bool,
    ) {
        self.unsubscribe(session_id, filter);

        let subscription = Subscription {
            session_id,
            filter: filter.to_string(),
            qos,
            no_local,
            retain_as_published,
        };

        if let Some((group, real_filter)) = Topic::new(filter).shared_group() {
            self.shared
                .entry(group.to_string())
                .or_default()
                .entry(real_filter.to_string())
                .or_default()
                .push(subscription);
        } else if is_sys_filter(filter) {
            self.sys.push(subscription);
        } else {
            self.plain.push(subscription);
        }
    }

    pub fn unsubscribe(&mut self, session_id: SessionId, filter: &str) {
        if let Some((group, real_filter)) = Topic::new(filter).shared_group() {
            if let Some(filters) = self.shared.get_mut(group) {
                if let Some(members) = filters.get_mut(real_filter) {
                    members.retain(|s| s.session_id != session_id);
                    if members.is_empty() {
                        filters.remove(real_filter);
                    }
                }
                if filters.is_empty() {
                    self.shared.remove(group);
                }
            }
        } else if is_sys_filter(filter) {
            self.sys
                .retain(|s| !(s.session_id == session_id && s.filter == filter));
        } else {
            self.plain
                .retain(|s| !(s.session_id == session_id && s.filter == filter));
        }
    }

    /// Drops every subscription owned by `session_id`, used on disconnect
    /// and on clean-start reconnection.
    pub fn remove_session(&mut self, session_id: SessionId) {
        self.plain.retain(|s| s.session_id != session_id);
        self.sys.retain(|s| s.session_id != session_id);
        self.shared.retain(|_, filters| {
            filters.retain(|_, members| {
                members.retain(|s| s.session_id != session_id);
                !members.is_empty()
            });
            !filters.is_empty()
        });
    }

    /// Returns the set of sessions a publish to `topic_name` should be
    /// delivered to, along with the subscription that matched (for QoS
    /// downgrade and no-local filtering). Shared groups contribute at most
    /// one randomly-selected member each.
    ///
    /// A `$`-prefixed `topic_name` is matched only against `sys`; any other
    /// topic is matched only against `plain`.
    pub fn matching_subscribers(&self, topic_name: &str) -> Vec<Subscription> {
        let first_level_list = if topic_name.starts_with('$') {
            &self.sys
        } else {
            &self.plain
        };
        let mut out: Vec<Subscription> = first_level_list
            .iter()
            .filter(|s| codec::matches(&s.filter, topic_name))
            .cloned()
            .collect();

        for filters in self.shared.values() {
            for members in filters.values() {
                let matching: Vec<&Subscription> = members
                    .iter()
                    .filter(|s| codec::matches(&s.filter, topic_name))
                    .collect();
                if matching.is_empty() {
                    continue;
                }
                let idx = rand::rng().random_range(0..matching.len());
                out.push(matching[idx].clone());
            }
        }

        out
    }

    pub fn set_retained(&mut self, topic_name: &str, qos: QoS, payload: Vec<u8>) {
        if payload.is_empty() {
            self.retained.remove(topic_name);
            return;
        }
        self.retained.insert(
            topic_name.to_string(),
            RetainedMessage {
                topic: topic_name.to_string(),
                qos,
                payload,
            },
        );
    }

    /// Retained messages whose topic name matches `filter`, used to deliver
    /// the retained set at SUBSCRIBE time. `$`-prefixed names are excluded
    /// from a first-level wildcard the same way live publishes are.
    pub fn retained_matching(&self, filter: &str) -> Vec<&RetainedMessage> {
        self.retained
            .values()
            .filter(|m| codec::matches(filter, &m.topic))
            .collect()
    }
}

/// Resolves the effective QoS a subscriber receives: the lesser of the
/// publisher's QoS and the subscription's requested maximum.
#[must_use]
pub fn effective_qos(publish_qos: QoS, subscribe_qos: QoS) -> QoS {
    if (publish_qos as u8) < (subscribe_qos as u8) {
        publish_qos
    } else {
        subscribe_qos
    }
}

#[must_use]
pub fn validate_filter(filter: &str) -> bool {
    codec::validate_sub_topic(filter).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_subscribe_and_match() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "a/b", QoS::AtLeastOnce, false, false);
        let matches = engine.matching_subscribers("a/b");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].session_id, 1);
    }

    #[test]
    fn test_unsubscribe_removes_entry() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "a/+", QoS::AtMostOnce, false, false);
        engine.unsubscribe(1, "a/+");
        assert!(engine.matching_subscribers("a/b").is_empty());
    }

    #[test]
    fn test_shared_subscription_picks_one_member() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "$share/g1/a/b", QoS::AtMostOnce, false, false);
        engine.subscribe(2, "$share/g1/a/b", QoS::AtMostOnce, false, false);
        let matches = engine.matching_subscribers("a/b");
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_retained_set_and_clear() {
        let mut engine = SubscriptionEngine::new();
        engine.set_retained("a/b", QoS::AtLeastOnce, vec![1, 2, 3]);
        assert_eq!(engine.retained_matching("a/+").len(), 1);
        engine.set_retained("a/b", QoS::AtLeastOnce, vec![]);
        assert_eq!(engine.retained_matching("a/+").len(), 0);
    }

    #[test]
    fn test_effective_qos_is_minimum() {
        assert_eq!(
            effective_qos(QoS::ExactlyOnce, QoS::AtLeastOnce),
            QoS::AtLeastOnce
        );
        assert_eq!(
            effective_qos(QoS::AtMostOnce, QoS::ExactlyOnce),
            QoS::AtMostOnce
        );
    }

    #[test]
    fn test_remove_session_clears_both_plain_and_shared() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "a/b", QoS::AtMostOnce, false, false);
        engine.subscribe(1, "$share/g/a/b", QoS::AtMostOnce, false, false);
        engine.remove_session(1);
        assert!(engine.matching_subscribers("a/b").is_empty());
    }

    #[test]
    fn test_sys_subscription_kept_separate_from_plain() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "$SYS/broker/uptime", QoS::AtMostOnce, false, false);
        engine.subscribe(2, "a/b", QoS::AtMostOnce, false, false);

        assert_eq!(engine.matching_subscribers("$SYS/broker/uptime").len(), 1);
        assert!(engine.matching_subscribers("a/b").len() == 1);
        // A plain `#` subscriber never sees into the `$SYS` store.
        engine.subscribe(3, "#", QoS::AtMostOnce, false, false);
        assert_eq!(engine.matching_subscribers("$SYS/broker/uptime").len(), 1);
    }

    #[test]
    fn test_remove_session_clears_sys_store() {
        let mut engine = SubscriptionEngine::new();
        engine.subscribe(1, "$SYS/broker/uptime", QoS::AtMostOnce, false, false);
        engine.remove_session(1);
        assert!(engine.matching_subscribers("$SYS/broker/uptime").is_empty());
    }
}
