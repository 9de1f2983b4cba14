// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Ties the trace tree, the action model and a live broker connection
//! together into the generation loop: pick an unexplored action, execute
//! it, record what came back, repeat until no unexplored action remains
//! from the current state, then restart from scratch.
//!
//! This is the Rust shape of the original model's `Executions.step()` /
//! `__run__()` loop: `enabled` stands in for `getEnabledActions()`, and the
//! per-step body is the same select-execute-record sequence.

use crate::executor::Executor;
use crate::model::{Action, Observation};
use crate::trace::{ActionKey, Traces};

/// One action taken during generation, paired with what it produced.
#[derive(Debug, Clone)]
pub struct Step {
    pub action: Action,
    pub observation: Option<Observation>,
}

/// Converts an `Action` into the key the trace tree records arcs under.
/// Parameters that make two actions meaningfully distinct paths (packet
/// id, topic) are folded in; payload bytes are not, since they don't change
/// which protocol path is exercised.
fn action_key(action: &Action) -> ActionKey {
    let mut key = vec![action.name().to_string()];
    match action {
        Action::Connect {
            client_id,
            clean_start,
            ..
        } => {
            key.push(client_id.clone());
            key.push(clean_start.to_string());
        }
        Action::Subscribe {
            packet_id, topic, ..
        }
        | Action::Unsubscribe { packet_id, topic } => {
            key.push(packet_id.to_string());
            key.push(topic.clone());
        }
        Action::Publish {
            packet_id,
            topic,
            qos,
            retain,
            ..
        } => {
            key.push(packet_id.map_or_else(|| "-".to_string(), |id| id.to_string()));
            key.push(topic.clone());
            key.push(format!("{qos:?}"));
            key.push(retain.to_string());
        }
        Action::PublishAck { packet_id }
        | Action::PublishReceived { packet_id }
        | Action::PublishRelease { packet_id }
        | Action::PublishComplete { packet_id } => {
            key.push(packet_id.to_string());
        }
        Action::PingRequest | Action::Disconnect => {}
    }
    key
}

/// Runs one generation pass: repeatedly ask `enabled` for the actions
/// reachable from the current point in the conversation, record them as
/// arcs, let the trace tree pick one that's still unexplored, execute it
/// against `executor`, and fold the result into `enabled`'s next call —
/// until either `enabled` returns nothing or `max_steps` is hit.
///
/// `enabled` takes the steps taken so far in this trace and returns the
/// actions legal to try next; it encodes the model's state machine (e.g.
/// "SUBSCRIBE is only legal after CONNECT").
pub async fn generate_one_trace<F>(
    traces: &mut Traces,
    executor: &mut Executor,
    max_steps: usize,
    mut enabled: F,
) -> Vec<Step>
where
    F: FnMut(&[Step]) -> Vec<Action>,
{
    let mut steps = Vec::new();

    for _ in 0..max_steps {
        let candidates = enabled(&steps);
        if candidates.is_empty() {
            break;
        }

        let keyed: Vec<(ActionKey, Action)> = candidates
            .into_iter()
            .map(|a| (action_key(&a), a))
            .collect();
        traces.add_arcs(keyed.iter().map(|(k, _)| k.clone()));

        let Some(chosen_key) = traces.find_next_path(None) else {
            break;
        };
        log::debug!("exploring action {:?}", chosen_key);
        traces.select_action(&chosen_key);

        let Some((_, action)) = keyed.into_iter().find(|(k, _)| *k == chosen_key) else {
            break;
        };

        if executor.act(&action).await.is_err() {
            steps.push(Step {
                action,
                observation: Some(Observation::Closed),
            });
            break;
        }
        let observation = executor.next_observation().await;
        let closed = matches!(observation, Some(Observation::Closed) | None);
        steps.push(Step { action, observation });
        if closed {
            break;
        }
    }

    traces.restart();
    steps
}
